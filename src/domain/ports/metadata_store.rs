use async_trait::async_trait;

use super::errors::CollaboratorError;
use crate::domain::models::MetadataObject;

/// The live metadata catalog read by the system under evaluation
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Get an object by identifier
    async fn get(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError>;

    /// List every object, ordered by identifier
    async fn list(&self) -> Result<Vec<MetadataObject>, CollaboratorError>;

    /// Create or replace an object
    async fn replace(&self, object: &MetadataObject) -> Result<(), CollaboratorError>;

    /// Remove an object; removing a missing object is not an error
    async fn remove(&self, id: &str) -> Result<(), CollaboratorError>;
}

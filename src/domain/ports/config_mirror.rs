use async_trait::async_trait;

use super::errors::CollaboratorError;
use crate::domain::models::MetadataObject;

/// Diffable text copy of the metadata catalog, one file per object, kept in
/// step with every live write
#[async_trait]
pub trait ConfigMirror: Send + Sync {
    /// Read the mirrored copy of an object
    async fn read(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError>;

    /// Write an object's file, creating or replacing it
    async fn write(&self, object: &MetadataObject) -> Result<(), CollaboratorError>;

    /// Delete an object's file; deleting a missing file is not an error
    async fn remove(&self, id: &str) -> Result<(), CollaboratorError>;
}

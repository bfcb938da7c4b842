use async_trait::async_trait;

use super::errors::CollaboratorError;
use crate::domain::models::ResultSet;

/// Query execution engine
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a query and return its tabular result
    async fn execute(&self, query: &str) -> Result<ResultSet, CollaboratorError>;

    /// Plan a query without running it. `Ok` means the query is valid.
    async fn explain(&self, query: &str) -> Result<(), CollaboratorError>;
}

use async_trait::async_trait;

use super::errors::CollaboratorError;
use crate::domain::models::BenchmarkQuestion;

/// Source of benchmark definitions
#[async_trait]
pub trait BenchmarkRepository: Send + Sync {
    /// Load every question in definition order
    async fn load(&self) -> Result<Vec<BenchmarkQuestion>, CollaboratorError>;

    /// Replace one question in place with a corrected version
    async fn rewrite_expected(&self, question: &BenchmarkQuestion) -> Result<(), CollaboratorError>;
}

use async_trait::async_trait;

use super::errors::CollaboratorError;

/// The natural-language-to-query system under evaluation
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Generate a candidate query for a question
    async fn generate(&self, question: &str) -> Result<String, CollaboratorError>;
}

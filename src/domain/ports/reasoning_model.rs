use async_trait::async_trait;

use super::errors::CollaboratorError;

/// Reasoning model backing the reasoning judges and the arbiter
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    /// Complete a prompt, returning the raw response text
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

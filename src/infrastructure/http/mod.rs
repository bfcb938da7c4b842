//! HTTP adapters for the external collaborators
//!
//! Each adapter makes exactly one attempt per call. Retries and call spacing
//! are applied by the services that use them.

pub mod anthropic;
pub mod execution;
pub mod generation;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::domain::ports::CollaboratorError;

pub use anthropic::AnthropicReasoningModel;
pub use execution::HttpQueryExecutor;
pub use generation::HttpQueryGenerator;

/// Shared client builder: pooled connections and a request timeout
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(10)
        .tcp_nodelay(true)
        .build()
        .context("Failed to build HTTP client")
}

/// Classify a transport-level failure
pub(crate) fn transport_error(err: &reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout
    } else if err.is_decode() {
        CollaboratorError::InvalidResponse(err.to_string())
    } else {
        CollaboratorError::Network(err.to_string())
    }
}

/// Turn a non-success response into an error, reading the body for context
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    Err(CollaboratorError::from_status(status.as_u16(), body))
}

//! Retrying JSON client shared by every reasoning judge.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::{AsiFeedback, FailureType, Severity};
use crate::domain::ports::{CollaboratorError, ReasoningModel};
use crate::infrastructure::resilience::{CallSpacing, RetryPolicy, Retryable};

/// Why a reasoning call produced no usable response
#[derive(Debug, Error)]
pub enum JudgeCallError {
    #[error("Reasoning call failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Empty response")]
    EmptyResponse,

    #[error("Response is not JSON: {0}")]
    NotJson(String),

    #[error("Response does not match the expected schema: {0}")]
    Schema(String),
}

impl Retryable for JudgeCallError {
    fn is_transient(&self) -> bool {
        // Malformed output is worth another attempt.
        match self {
            Self::Collaborator(err) => err.is_transient(),
            Self::EmptyResponse | Self::NotJson(_) | Self::Schema(_) => true,
        }
    }
}

/// Structured response every reasoning judge must return
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeResponse {
    pub verdict: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub failure_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub blame_set: Vec<String>,
    #[serde(default)]
    pub wrong_clause: Option<String>,
    #[serde(default)]
    pub expected_value: Option<serde_json::Value>,
    #[serde(default)]
    pub actual_value: Option<serde_json::Value>,
    #[serde(default)]
    pub counterfactual_fix: Option<String>,
    #[serde(default)]
    pub ambiguity_detected: bool,
}

fn value_text(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from)
}

impl JudgeResponse {
    /// Normalized verdict label.
    pub fn label(&self) -> String {
        self.verdict.trim().to_ascii_lowercase()
    }

    /// Feedback described by the response. Unrecognized failure types become
    /// `other`; a missing severity defaults to `major`.
    pub fn feedback(&self) -> AsiFeedback {
        let failure_type = self
            .failure_type
            .as_deref()
            .and_then(FailureType::from_str)
            .unwrap_or(FailureType::Other);
        let severity = self
            .severity
            .as_deref()
            .and_then(Severity::from_str)
            .unwrap_or(Severity::Major);

        let mut asi = AsiFeedback::new(failure_type, severity, self.confidence.unwrap_or(0.5))
            .with_blame(
                self.blame_set
                    .iter()
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty()),
            )
            .with_values(
                value_text(self.expected_value.as_ref()),
                value_text(self.actual_value.as_ref()),
            )
            .with_ambiguity(self.ambiguity_detected);
        asi.wrong_clause = non_empty(self.wrong_clause.as_ref());
        asi.counterfactual_fix = non_empty(self.counterfactual_fix.as_ref());
        asi
    }
}

/// Remove a surrounding Markdown code fence, if any.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a raw completion into a judge response whose verdict is one of `allowed`.
pub fn parse_response(raw: &str, allowed: &[&str]) -> Result<JudgeResponse, JudgeCallError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(JudgeCallError::EmptyResponse);
    }

    let parsed = serde_json::from_str::<JudgeResponse>(text).or_else(|first_err| {
        // Tolerate prose around a single JSON object.
        match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<JudgeResponse>(&text[start..=end])
            }
            _ => Err(first_err),
        }
    });

    let response = parsed.map_err(|e| {
        if e.is_data() {
            JudgeCallError::Schema(e.to_string())
        } else {
            JudgeCallError::NotJson(e.to_string())
        }
    })?;

    let label = response.label();
    if !allowed.contains(&label.as_str()) {
        return Err(JudgeCallError::Schema(format!(
            "verdict '{}' is not one of {}",
            response.verdict,
            allowed.join(", ")
        )));
    }
    Ok(response)
}

/// Sends prompts to the reasoning model with call spacing and retries
pub struct JudgeClient {
    model: Arc<dyn ReasoningModel>,
    spacing: Arc<CallSpacing>,
    retry: RetryPolicy,
}

impl JudgeClient {
    pub fn new(model: Arc<dyn ReasoningModel>, spacing: Arc<CallSpacing>, retry: RetryPolicy) -> Self {
        Self {
            model,
            spacing,
            retry,
        }
    }

    /// Call the model until it returns a valid response or retries run out.
    pub async fn call(
        &self,
        prompt: &str,
        allowed: &[&str],
    ) -> Result<JudgeResponse, JudgeCallError> {
        self.retry
            .execute(move || async move {
                self.spacing.acquire().await;
                let raw = self.model.complete(prompt).await?;
                let parsed = parse_response(&raw, allowed);
                if let Err(err) = &parsed {
                    debug!(error = %err, "Discarding malformed judge response");
                }
                parsed
            })
            .await
    }
}

//! The fixed judge set.
//!
//! Every judge reads the same precomputed [`Prediction`]; none of them runs a
//! query. Judges are registered once, in [`JudgeKind::PANEL`] order, by
//! [`standard_judges`].

pub mod client;
pub mod code;
pub mod reasoning;

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::models::{BenchmarkQuestion, Comparison, JudgeKind, JudgeProfile, Verdict};

pub use client::{JudgeCallError, JudgeClient, JudgeResponse};
pub use code::{AssetRoutingJudge, ResultCorrectnessJudge, SyntaxJudge};
pub use reasoning::{ArbiterJudge, ReasoningJudge};

/// Outcome of the predict step for one question, shared by every judge
#[derive(Debug, Clone)]
pub struct Prediction {
    pub question: BenchmarkQuestion,
    /// Sanitized candidate query, absent when generation failed
    pub candidate: Option<String>,
    /// Planning outcome of the candidate; `None` when there is no candidate
    pub explain: Option<Result<(), String>>,
    pub comparison: Comparison,
    /// Collaborator failures observed during prediction
    pub errors: Vec<String>,
}

/// A single judge
#[async_trait]
pub trait Judge: Send + Sync {
    fn kind(&self) -> JudgeKind;

    /// Score a prediction. Never fails: unrecoverable problems become an
    /// `unknown` verdict.
    async fn score(&self, prediction: &Prediction) -> Verdict;
}

/// The standard judge list, in evaluation order.
pub fn standard_judges(
    client: Arc<JudgeClient>,
    profile: Arc<JudgeProfile>,
) -> Vec<Arc<dyn Judge>> {
    JudgeKind::PANEL
        .into_iter()
        .map(|kind| -> Arc<dyn Judge> {
            match kind {
                JudgeKind::SyntaxValidity => Arc::new(SyntaxJudge),
                JudgeKind::AssetRouting => Arc::new(AssetRoutingJudge),
                JudgeKind::ResultCorrectness => Arc::new(ResultCorrectnessJudge),
                JudgeKind::Arbiter => Arc::new(ArbiterJudge::new(client.clone(), profile.clone())),
                quality => Arc::new(ReasoningJudge::new(quality, client.clone(), profile.clone())),
            }
        })
        .collect()
}

//! Judges backed by the reasoning model.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::client::JudgeClient;
use super::{Judge, Prediction};
use crate::domain::models::{
    ArbiterOutcome, AsiFeedback, FailureType, JudgeKind, JudgeProfile, Severity, Verdict,
};

const YES_NO: &[&str] = &["yes", "no"];
const ARBITER_OUTCOMES: &[&str] = &[
    "genie_correct",
    "ground_truth_correct",
    "both_correct",
    "neither_correct",
];

fn comparison_summary(prediction: &Prediction) -> String {
    let c = &prediction.comparison;
    match &c.error {
        Some(error) => format!("{} ({error})", c.match_type.as_str()),
        None => format!(
            "{}: expected {} rows, candidate {} rows",
            c.match_type.as_str(),
            c.gt_rows,
            c.cand_rows
        ),
    }
}

fn render(profile: &JudgeProfile, kind: JudgeKind, prediction: &Prediction) -> Option<String> {
    profile.render(
        kind,
        &prediction.question.question,
        &prediction.question.expected_query,
        prediction.candidate.as_deref().unwrap_or("(no query generated)"),
        &comparison_summary(prediction),
    )
}

/// Schema, logical, semantic and completeness review, parameterized by kind
pub struct ReasoningJudge {
    kind: JudgeKind,
    client: Arc<JudgeClient>,
    profile: Arc<JudgeProfile>,
}

impl ReasoningJudge {
    pub fn new(kind: JudgeKind, client: Arc<JudgeClient>, profile: Arc<JudgeProfile>) -> Self {
        Self {
            kind,
            client,
            profile,
        }
    }
}

#[async_trait]
impl Judge for ReasoningJudge {
    fn kind(&self) -> JudgeKind {
        self.kind
    }

    async fn score(&self, prediction: &Prediction) -> Verdict {
        if prediction.candidate.is_none() {
            return Verdict::fail(
                "no candidate query to review",
                AsiFeedback::new(FailureType::Other, Severity::Critical, 0.5),
            );
        }
        let Some(prompt) = render(&self.profile, self.kind, prediction) else {
            return Verdict::unknown(format!(
                "judge profile {} has no template for {}",
                self.profile.version, self.kind
            ));
        };

        match self.client.call(&prompt, YES_NO).await {
            Ok(response) if response.label() == "yes" => Verdict::pass(response.rationale),
            Ok(response) => {
                let asi = response.feedback();
                Verdict::fail(response.rationale, asi)
            }
            Err(err) => {
                warn!(judge = %self.kind, question_id = %prediction.question.id, error = %err, "Judge failed after retries");
                Verdict::unknown(format!("judge call failed: {err}"))
            }
        }
    }
}

/// Conditional third layer: adjudicates only when results disagree
pub struct ArbiterJudge {
    client: Arc<JudgeClient>,
    profile: Arc<JudgeProfile>,
}

impl ArbiterJudge {
    pub fn new(client: Arc<JudgeClient>, profile: Arc<JudgeProfile>) -> Self {
        Self { client, profile }
    }
}

#[async_trait]
impl Judge for ArbiterJudge {
    fn kind(&self) -> JudgeKind {
        JudgeKind::Arbiter
    }

    async fn score(&self, prediction: &Prediction) -> Verdict {
        if prediction.comparison.matched {
            return Verdict::skipped("results match; no adjudication needed");
        }
        let Some(prompt) = render(&self.profile, JudgeKind::Arbiter, prediction) else {
            return Verdict::unknown(format!(
                "judge profile {} has no arbiter template",
                self.profile.version
            ));
        };

        match self.client.call(&prompt, ARBITER_OUTCOMES).await {
            Ok(response) => {
                let outcome = ArbiterOutcome::from_str(&response.label())
                    .unwrap_or(ArbiterOutcome::GroundTruthCorrect);
                let verdict = if outcome.candidate_acceptable() {
                    Verdict::pass(response.rationale)
                } else {
                    let asi = response.feedback();
                    Verdict::fail(response.rationale, asi)
                };
                verdict.with_arbiter(outcome)
            }
            Err(err) => {
                warn!(question_id = %prediction.question.id, error = %err, "Arbiter failed after retries");
                Verdict::unknown(format!("arbiter call failed: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BenchmarkQuestion, Comparison, MatchType, VerdictValue};
    use crate::infrastructure::memory::ScriptedReasoningModel;
    use crate::infrastructure::resilience::{CallSpacing, RetryPolicy};

    fn client(reply: &'static str) -> Arc<JudgeClient> {
        Arc::new(JudgeClient::new(
            Arc::new(ScriptedReasoningModel::new(move |_| Ok(reply.to_string()))),
            Arc::new(CallSpacing::from_millis(0)),
            RetryPolicy::new(0, 1, 1),
        ))
    }

    fn mismatched() -> Prediction {
        let mut comparison = Comparison::failed("n/a");
        comparison.match_type = MatchType::Mismatch;
        comparison.error = None;
        Prediction {
            question: BenchmarkQuestion::new("q1", "total revenue", "SELECT SUM(revenue) FROM sales"),
            candidate: Some("SELECT SUM(amount) FROM sales".to_string()),
            explain: Some(Ok(())),
            comparison,
            errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_arbiter_outcomes_map_to_verdicts() {
        let profile = Arc::new(JudgeProfile::builtin());

        let genie = ArbiterJudge::new(
            client(r#"{"verdict": "genie_correct", "rationale": "expected query is stale"}"#),
            profile.clone(),
        )
        .score(&mismatched())
        .await;
        assert!(genie.is_pass());
        assert_eq!(genie.arbiter, Some(ArbiterOutcome::GenieCorrect));

        let neither = ArbiterJudge::new(
            client(r#"{"verdict": "neither_correct", "rationale": "both wrong", "failure_type": "wrong_join"}"#),
            profile,
        )
        .score(&mismatched())
        .await;
        assert_eq!(neither.value, VerdictValue::No);
        assert_eq!(neither.arbiter, Some(ArbiterOutcome::NeitherCorrect));
        assert_eq!(neither.asi.unwrap().failure_type, FailureType::WrongJoin);
    }

    #[tokio::test]
    async fn test_missing_template_is_unknown() {
        let mut profile = JudgeProfile::builtin();
        profile.templates.remove(&JudgeKind::Completeness);
        let verdict = ReasoningJudge::new(
            JudgeKind::Completeness,
            client(r#"{"verdict": "yes"}"#),
            Arc::new(profile),
        )
        .score(&mismatched())
        .await;
        assert_eq!(verdict.value, VerdictValue::Unknown);
        assert!(verdict.asi.is_some());
    }

    #[tokio::test]
    async fn test_reasoning_judge_fails_without_candidate() {
        let mut prediction = mismatched();
        prediction.candidate = None;
        let verdict = ReasoningJudge::new(
            JudgeKind::SchemaAccuracy,
            client(r#"{"verdict": "yes"}"#),
            Arc::new(JudgeProfile::builtin()),
        )
        .score(&prediction)
        .await;
        assert!(verdict.is_failure());
    }
}

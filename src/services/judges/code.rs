//! Deterministic judges that need no reasoning model.

use async_trait::async_trait;

use super::{Judge, Prediction};
use crate::domain::models::{
    AsiFeedback, FailureType, JudgeKind, MatchType, Severity, Verdict,
};
use crate::services::query_text;

fn no_candidate() -> Verdict {
    Verdict::fail(
        "no candidate query was generated",
        AsiFeedback::new(FailureType::Other, Severity::Critical, 0.5),
    )
}

/// Classify a planner error message into a failure type.
fn classify_planning_error(message: &str) -> FailureType {
    let lower = message.to_lowercase();
    let missing = ["cannot be resolved", "cannot be found", "not found", "unresolved", "does not exist", "unknown"]
        .iter()
        .any(|p| lower.contains(p));
    if missing && lower.contains("column") {
        FailureType::WrongColumn
    } else if missing && (lower.contains("table") || lower.contains("view") || lower.contains("relation")) {
        FailureType::WrongTable
    } else if missing && lower.contains("function") {
        FailureType::ParameterError
    } else {
        FailureType::Other
    }
}

/// Can the candidate be planned without error
pub struct SyntaxJudge;

#[async_trait]
impl Judge for SyntaxJudge {
    fn kind(&self) -> JudgeKind {
        JudgeKind::SyntaxValidity
    }

    async fn score(&self, prediction: &Prediction) -> Verdict {
        match &prediction.explain {
            None => no_candidate(),
            Some(Ok(())) => Verdict::pass("candidate query plans without error"),
            Some(Err(message)) => {
                let failure_type = classify_planning_error(message);
                let confidence = if failure_type == FailureType::Other { 0.6 } else { 0.9 };
                Verdict::fail(
                    format!("candidate query failed to plan: {message}"),
                    AsiFeedback::new(failure_type, Severity::Critical, confidence)
                        .with_values(None, Some(message.clone())),
                )
            }
        }
    }
}

/// Asset class inferred from identifier naming conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssetClass {
    View,
    Function,
    Table,
}

impl AssetClass {
    fn of_query(query: &str) -> Self {
        let lower = query.to_lowercase();
        let objects = query_text::referenced_objects(query);
        let short = |o: &String| o.rsplit('.').next().unwrap_or(o).to_string();
        if lower.contains("measure(") || objects.iter().any(|o| short(o).starts_with("mv_")) {
            Self::View
        } else if objects.iter().any(|o| short(o).starts_with("get_")) {
            Self::Function
        } else {
            Self::Table
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Function => "function",
            Self::Table => "table",
        }
    }
}

/// Did generation pick the preferred metadata surface
pub struct AssetRoutingJudge;

#[async_trait]
impl Judge for AssetRoutingJudge {
    fn kind(&self) -> JudgeKind {
        JudgeKind::AssetRouting
    }

    async fn score(&self, prediction: &Prediction) -> Verdict {
        let Some(candidate) = &prediction.candidate else {
            return no_candidate();
        };
        let question = &prediction.question;
        let used = query_text::referenced_objects(candidate);
        let actual = used.first().cloned();

        if let Some(expected_asset) = &question.expected_asset {
            if query_text::references(candidate, expected_asset) {
                return Verdict::pass(format!("candidate uses preferred surface {expected_asset}"));
            }
            let fix = format!(
                "Route questions like '{}' to {expected_asset}{}",
                question.question,
                actual.as_ref().map(|a| format!(" instead of {a}")).unwrap_or_default()
            );
            return Verdict::fail(
                format!(
                    "expected surface {expected_asset}, candidate used {}",
                    actual.as_deref().unwrap_or("nothing")
                ),
                AsiFeedback::new(FailureType::AssetRoutingError, Severity::Major, 0.85)
                    .with_blame([expected_asset.clone()])
                    .with_wrong_clause("FROM")
                    .with_values(Some(expected_asset.clone()), actual)
                    .with_fix(fix)
                    .with_ambiguity(true),
            );
        }

        let expected_class = AssetClass::of_query(&question.expected_query);
        let actual_class = AssetClass::of_query(candidate);
        if expected_class == actual_class {
            Verdict::pass(format!("candidate uses a {} as expected", expected_class.as_str()))
        } else {
            Verdict::fail(
                format!(
                    "expected a {} but candidate used a {}",
                    expected_class.as_str(),
                    actual_class.as_str()
                ),
                AsiFeedback::new(FailureType::AssetRoutingError, Severity::Major, 0.7)
                    .with_blame(query_text::referenced_objects(&question.expected_query))
                    .with_wrong_clause("FROM")
                    .with_values(
                        Some(expected_class.as_str().to_string()),
                        Some(actual_class.as_str().to_string()),
                    ),
            )
        }
    }
}

/// Reads the precomputed result comparison
pub struct ResultCorrectnessJudge;

#[async_trait]
impl Judge for ResultCorrectnessJudge {
    fn kind(&self) -> JudgeKind {
        JudgeKind::ResultCorrectness
    }

    async fn score(&self, prediction: &Prediction) -> Verdict {
        let comparison = &prediction.comparison;
        if comparison.matched {
            return Verdict::pass(format!("results match ({})", comparison.match_type.as_str()));
        }
        if comparison.match_type == MatchType::Error {
            let error = comparison.error.clone().unwrap_or_default();
            return Verdict::fail(
                format!("results could not be compared: {error}"),
                AsiFeedback::new(FailureType::Other, Severity::Major, 0.7)
                    .with_values(None, Some(error)),
            );
        }
        Verdict::fail(
            format!(
                "results differ ({}): expected {} rows, got {}",
                comparison.match_type.as_str(),
                comparison.gt_rows,
                comparison.cand_rows
            ),
            AsiFeedback::new(FailureType::WrongAggregation, Severity::Major, 0.8).with_values(
                Some(format!("{} rows", comparison.gt_rows)),
                Some(format!("{} rows", comparison.cand_rows)),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BenchmarkQuestion, Comparison, VerdictValue};

    fn prediction(candidate: Option<&str>, explain: Option<Result<(), String>>) -> Prediction {
        Prediction {
            question: BenchmarkQuestion::new("q1", "total revenue", "SELECT SUM(revenue) FROM sales"),
            candidate: candidate.map(String::from),
            explain,
            comparison: Comparison::failed("n/a"),
            errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_syntax_judge_classifies_planning_errors() {
        let verdict = SyntaxJudge
            .score(&prediction(
                Some("SELECT revenu FROM sales"),
                Some(Err("Column 'revenu' cannot be resolved".to_string())),
            ))
            .await;
        assert_eq!(verdict.value, VerdictValue::No);
        assert_eq!(verdict.asi.unwrap().failure_type, FailureType::WrongColumn);

        let ok = SyntaxJudge.score(&prediction(Some("SELECT 1"), Some(Ok(())))).await;
        assert!(ok.is_pass());

        let missing = SyntaxJudge.score(&prediction(None, None)).await;
        assert!(missing.is_failure());
        assert!(missing.asi.is_some());
    }

    #[tokio::test]
    async fn test_routing_judge_with_expected_asset() {
        let mut p = prediction(Some("SELECT SUM(revenue) FROM sales"), Some(Ok(())));
        p.question = p.question.with_expected_asset("mv_sales_summary");
        let verdict = AssetRoutingJudge.score(&p).await;
        assert!(verdict.is_failure());
        let asi = verdict.asi.unwrap();
        assert_eq!(asi.failure_type, FailureType::AssetRoutingError);
        assert_eq!(asi.blame_set, vec!["mv_sales_summary"]);
        assert_eq!(asi.actual_value.as_deref(), Some("sales"));

        p.candidate = Some("SELECT MEASURE(revenue) FROM mv_sales_summary".to_string());
        assert!(AssetRoutingJudge.score(&p).await.is_pass());
    }

    #[tokio::test]
    async fn test_routing_judge_infers_asset_class() {
        let p = prediction(Some("SELECT * FROM get_revenue(2024)"), Some(Ok(())));
        let verdict = AssetRoutingJudge.score(&p).await;
        assert!(verdict.is_failure());
        assert_eq!(verdict.asi.unwrap().actual_value.as_deref(), Some("function"));
    }

    #[tokio::test]
    async fn test_result_judge_reads_comparison() {
        let mut p = prediction(Some("SELECT 1"), Some(Ok(())));
        p.comparison.matched = true;
        p.comparison.match_type = MatchType::Hash;
        p.comparison.error = None;
        assert!(ResultCorrectnessJudge.score(&p).await.is_pass());

        p.comparison.matched = false;
        p.comparison.match_type = MatchType::Mismatch;
        let verdict = ResultCorrectnessJudge.score(&p).await;
        assert_eq!(verdict.asi.unwrap().failure_type, FailureType::WrongAggregation);
    }
}

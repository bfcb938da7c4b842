//! Scorer pipeline: predict once per question, then run every judge over the
//! shared prediction.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::domain::models::{
    BenchmarkQuestion, Comparison, EvaluationRecord, JudgeKind, RepeatabilityCheck, ResultSet,
    Verdict, VerdictValue,
};
use crate::domain::ports::{CollaboratorError, QueryExecutor, QueryGenerator};
use crate::infrastructure::resilience::{CallSpacing, RetryPolicy};
use crate::services::judges::{Judge, Prediction};
use crate::services::{query_text, repeatability, result_comparator};

/// Runs benchmark questions through prediction and the judge list
#[derive(Clone)]
pub struct Evaluator {
    generator: Arc<dyn QueryGenerator>,
    executor: Arc<dyn QueryExecutor>,
    judges: Arc<Vec<Arc<dyn Judge>>>,
    generation_spacing: Arc<CallSpacing>,
    retry: RetryPolicy,
    max_concurrency: usize,
}

impl Evaluator {
    pub fn new(
        generator: Arc<dyn QueryGenerator>,
        executor: Arc<dyn QueryExecutor>,
        judges: Vec<Arc<dyn Judge>>,
        generation_spacing: Arc<CallSpacing>,
        retry: RetryPolicy,
        max_concurrency: usize,
    ) -> Self {
        Self {
            generator,
            executor,
            judges: Arc::new(judges),
            generation_spacing,
            retry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Evaluate every question. Returns exactly one record per question, in
    /// input order.
    pub async fn evaluate(&self, questions: &[BenchmarkQuestion]) -> Vec<EvaluationRecord> {
        self.evaluate_until(questions, &CancellationToken::new()).await
    }

    /// Evaluate questions until `cancel` fires. Cancellation is observed only
    /// between units: a started question always finishes, and questions not
    /// yet started are left out of the result.
    #[instrument(skip_all, fields(questions = questions.len()))]
    pub async fn evaluate_until(
        &self,
        questions: &[BenchmarkQuestion],
        cancel: &CancellationToken,
    ) -> Vec<EvaluationRecord> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(questions.len());

        for question in questions {
            if cancel.is_cancelled() {
                info!(remaining = questions.len() - handles.len(), "Evaluation cancelled");
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                info!(remaining = questions.len() - handles.len(), "Evaluation cancelled");
                break;
            }

            let evaluator = self.clone();
            let question = question.clone();
            let question_id = question.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                evaluator.evaluate_question(question).await
            });
            handles.push((question_id, handle));
        }

        let mut records = Vec::with_capacity(handles.len());
        for (question_id, handle) in handles {
            match handle.await {
                Ok(record) => records.push(record),
                Err(join_err) => {
                    error!(question_id = %question_id, error = %join_err, "Evaluation unit aborted");
                    records.push(self.unscored_record(question_id, &join_err.to_string()));
                }
            }
        }
        records
    }

    /// Predict once, then run every judge in order over the same prediction.
    #[instrument(skip(self, question), fields(question_id = %question.id))]
    pub async fn evaluate_question(&self, question: BenchmarkQuestion) -> EvaluationRecord {
        let prediction = self.predict(question).await;

        let mut verdicts = BTreeMap::new();
        let mut errors = prediction.errors.clone();
        for judge in self.judges.iter() {
            let verdict = judge.score(&prediction).await;
            if verdict.value == VerdictValue::Unknown {
                errors.push(format!("{}: {}", judge.kind(), verdict.rationale));
            }
            debug!(judge = %judge.kind(), verdict = verdict.value.as_str(), "Judge scored");
            verdicts.insert(judge.kind(), verdict);
        }

        EvaluationRecord {
            question_id: prediction.question.id.clone(),
            generated_query: prediction.candidate.clone(),
            comparison: prediction.comparison,
            verdicts,
            errors,
        }
    }

    /// Generate the candidate, execute both queries once each, plan the
    /// candidate once and compare the results.
    pub async fn predict(&self, question: BenchmarkQuestion) -> Prediction {
        let mut errors = Vec::new();

        let candidate = match self.generate(&question.question).await {
            Ok(query) => Some(query).filter(|q| !q.is_empty()),
            Err(err) => {
                errors.push(format!("generation: {err}"));
                None
            }
        };
        if candidate.is_none() && errors.is_empty() {
            errors.push("generation: empty query".to_string());
        }

        let expected_query = question.expected_query.as_str();
        let (expected, candidate_result, explain) = match &candidate {
            Some(query) => {
                let (expected, actual, explain) = tokio::join!(
                    self.execute(expected_query),
                    self.execute(query),
                    self.retry.execute(move || self.executor.explain(query)),
                );
                (expected, actual, Some(explain.map_err(|e| e.to_string())))
            }
            None => (
                self.execute(expected_query).await,
                Err(CollaboratorError::Rejected("no candidate query".to_string())),
                None,
            ),
        };

        if let Err(err) = &expected {
            errors.push(format!("expected execution: {err}"));
        }
        if candidate.is_some() {
            if let Err(err) = &candidate_result {
                errors.push(format!("candidate execution: {err}"));
            }
        }

        let comparison = result_comparator::compare_outcomes(&expected, &candidate_result);

        Prediction {
            question,
            candidate,
            explain,
            comparison,
            errors,
        }
    }

    /// Regenerate each evaluated question `extra_runs` more times and classify
    /// how often the generator repeats itself. Questions without a generated
    /// query are not checked. Cancellation stops further generations.
    #[instrument(skip_all, fields(records = records.len(), extra_runs = extra_runs))]
    pub async fn check_repeatability(
        &self,
        questions: &[BenchmarkQuestion],
        records: &[EvaluationRecord],
        extra_runs: usize,
        cancel: &CancellationToken,
    ) -> Vec<RepeatabilityCheck> {
        let units: Vec<(&BenchmarkQuestion, &str)> = records
            .iter()
            .filter_map(|r| {
                let question = questions.iter().find(|q| q.id == r.question_id)?;
                Some((question, r.generated_query.as_deref()?))
            })
            .collect();

        stream::iter(units)
            .map(|(question, evaluated)| async move {
                let mut generations = vec![Some(evaluated.to_string())];
                for _ in 0..extra_runs {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let generated = self.generate(&question.question).await;
                    generations.push(generated.ok().filter(|q| !q.is_empty()));
                }
                repeatability::assess(&question.id, &generations)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await
    }

    /// One spaced, retried generation, sanitized.
    async fn generate(&self, question: &str) -> Result<String, CollaboratorError> {
        let raw = self
            .retry
            .execute(move || async move {
                self.generation_spacing.acquire().await;
                self.generator.generate(question).await
            })
            .await?;
        Ok(query_text::sanitize(&raw))
    }

    async fn execute(&self, query: &str) -> Result<ResultSet, CollaboratorError> {
        self.retry.execute(move || self.executor.execute(query)).await
    }

    fn unscored_record(&self, question_id: String, error: &str) -> EvaluationRecord {
        let verdicts = self
            .judges
            .iter()
            .map(|j| (j.kind(), Verdict::unknown(format!("evaluation aborted: {error}"))))
            .collect();
        EvaluationRecord {
            question_id,
            generated_query: None,
            comparison: Comparison::failed(error),
            verdicts,
            errors: vec![format!("evaluation aborted: {error}")],
        }
    }

    /// Judges in registration order.
    pub fn judge_kinds(&self) -> Vec<JudgeKind> {
        self.judges.iter().map(|j| j.kind()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{JudgeProfile, MatchType, Value};
    use crate::domain::ports::ReasoningModel;
    use crate::services::judges::{standard_judges, JudgeClient};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedGenerator(HashMap<String, String>);

    #[async_trait]
    impl QueryGenerator for FixedGenerator {
        async fn generate(&self, question: &str) -> Result<String, CollaboratorError> {
            self.0
                .get(question)
                .cloned()
                .ok_or_else(|| CollaboratorError::Rejected("unknown question".into()))
        }
    }

    #[derive(Default)]
    struct TableExecutor {
        results: HashMap<String, ResultSet>,
        executions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryExecutor for TableExecutor {
        async fn execute(&self, query: &str) -> Result<ResultSet, CollaboratorError> {
            self.executions.lock().unwrap().push(query.to_string());
            self.results
                .get(query)
                .cloned()
                .ok_or_else(|| CollaboratorError::QueryFailed(format!("table not found in {query}")))
        }

        async fn explain(&self, query: &str) -> Result<(), CollaboratorError> {
            if self.results.contains_key(query) {
                Ok(())
            } else {
                Err(CollaboratorError::QueryFailed("Table or view not found".into()))
            }
        }
    }

    struct CountingModel {
        calls: AtomicUsize,
        arbiter_calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningModel for CountingModel {
        async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("adjudicate") {
                self.arbiter_calls.fetch_add(1, Ordering::SeqCst);
                return Ok(r#"{"verdict": "ground_truth_correct", "failure_type": "wrong_column", "blame_set": ["sales.revenue"], "rationale": "wrong column"}"#.to_string());
            }
            Ok(r#"{"verdict": "yes", "rationale": "fine"}"#.to_string())
        }
    }

    fn one_row(v: i64) -> ResultSet {
        ResultSet::new(vec!["total".into()], vec![vec![Value::Int(v)]])
    }

    /// Reasoning model that is never reachable
    #[derive(Default)]
    struct FailingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CollaboratorError::Unavailable("model endpoint down".into()))
        }
    }

    fn evaluator(model: Arc<CountingModel>, executor: Arc<TableExecutor>) -> Evaluator {
        evaluator_with(model, executor, RetryPolicy::new(3, 1, 2))
    }

    fn evaluator_with(
        model: Arc<dyn ReasoningModel>,
        executor: Arc<TableExecutor>,
        judge_retry: RetryPolicy,
    ) -> Evaluator {
        let generator = FixedGenerator(HashMap::from([
            ("match".to_string(), "SELECT 1 AS total;".to_string()),
            ("differ".to_string(), "SELECT 2 AS total".to_string()),
        ]));
        let client = Arc::new(JudgeClient::new(
            model,
            Arc::new(CallSpacing::from_millis(0)),
            judge_retry,
        ));
        Evaluator::new(
            Arc::new(generator),
            executor,
            standard_judges(client, Arc::new(JudgeProfile::builtin())),
            Arc::new(CallSpacing::from_millis(0)),
            RetryPolicy::new(3, 1, 2),
            2,
        )
    }

    fn fixture() -> (Arc<CountingModel>, Arc<TableExecutor>) {
        let model = Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
            arbiter_calls: AtomicUsize::new(0),
        });
        let executor = Arc::new(TableExecutor {
            results: HashMap::from([
                ("SELECT 1 AS total".to_string(), one_row(1)),
                ("SELECT 2 AS total".to_string(), one_row(2)),
                ("SELECT total FROM expected".to_string(), one_row(1)),
            ]),
            executions: Mutex::new(Vec::new()),
        });
        (model, executor)
    }

    #[tokio::test]
    async fn test_arbiter_skipped_without_calls_when_results_match() {
        let (model, executor) = fixture();
        let evaluator = evaluator(model.clone(), executor.clone());
        let question = BenchmarkQuestion::new("q1", "match", "SELECT total FROM expected");

        let record = evaluator.evaluate_question(question).await;

        assert_eq!(record.comparison.match_type, MatchType::Exact);
        assert_eq!(record.verdict(JudgeKind::Arbiter).unwrap().value, VerdictValue::Skipped);
        assert_eq!(model.arbiter_calls.load(Ordering::SeqCst), 0);
        assert_eq!(record.verdicts.len(), JudgeKind::PANEL.len());
        // Each query executed exactly once
        assert_eq!(executor.executions.lock().unwrap().len(), 2);
        assert_eq!(record.generated_query.as_deref(), Some("SELECT 1 AS total"));
    }

    #[tokio::test]
    async fn test_arbiter_invoked_on_mismatch() {
        let (model, executor) = fixture();
        let evaluator = evaluator(model.clone(), executor);
        let question = BenchmarkQuestion::new("q2", "differ", "SELECT total FROM expected");

        let record = evaluator.evaluate_question(question).await;

        assert!(!record.comparison.matched);
        let arbiter = record.verdict(JudgeKind::Arbiter).unwrap();
        assert_eq!(arbiter.value, VerdictValue::No);
        assert_eq!(
            arbiter.arbiter,
            Some(crate::domain::models::ArbiterOutcome::GroundTruthCorrect)
        );
        assert_eq!(model.arbiter_calls.load(Ordering::SeqCst), 1);
        assert!(!record.is_correct());
    }

    #[tokio::test]
    async fn test_one_record_per_question_even_when_generation_fails() {
        let (model, executor) = fixture();
        let evaluator = evaluator(model, executor);
        let questions = vec![
            BenchmarkQuestion::new("a", "match", "SELECT total FROM expected"),
            BenchmarkQuestion::new("b", "unanswerable", "SELECT total FROM expected"),
            BenchmarkQuestion::new("c", "differ", "SELECT total FROM expected"),
        ];

        let records = evaluator.evaluate(&questions).await;

        assert_eq!(records.len(), questions.len());
        let ids: Vec<_> = records.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let failed = &records[1];
        assert!(failed.generated_query.is_none());
        assert!(failed.errors.iter().any(|e| e.starts_with("generation")));
        assert!(failed.verdict(JudgeKind::SyntaxValidity).unwrap().is_failure());
    }

    #[tokio::test]
    async fn test_cancelled_evaluation_starts_no_units() {
        let (model, executor) = fixture();
        let evaluator = evaluator(model, executor);
        let token = CancellationToken::new();
        token.cancel();

        let records = evaluator
            .evaluate_until(&[BenchmarkQuestion::new("a", "match", "SELECT total FROM expected")], &token)
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_reasoning_model_yields_unknown_verdicts() {
        let (_, executor) = fixture();
        let model = Arc::new(FailingModel::default());
        let evaluator = evaluator_with(model.clone(), executor, RetryPolicy::new(1, 1, 1));
        let questions = vec![
            BenchmarkQuestion::new("a", "match", "SELECT total FROM expected"),
            BenchmarkQuestion::new("b", "differ", "SELECT total FROM expected"),
        ];

        let records = evaluator.evaluate(&questions).await;

        assert_eq!(records.len(), questions.len());
        let reasoning_kinds = [
            JudgeKind::SchemaAccuracy,
            JudgeKind::LogicalAccuracy,
            JudgeKind::SemanticEquivalence,
            JudgeKind::Completeness,
        ];
        for record in &records {
            for kind in reasoning_kinds {
                let verdict = record.verdict(kind).unwrap();
                assert_eq!(verdict.value, VerdictValue::Unknown, "{kind} on {}", record.question_id);
                let asi = verdict.asi.as_ref().unwrap();
                assert_eq!(asi.failure_type, crate::domain::models::FailureType::Other);
                assert_eq!(asi.confidence, 0.0);
                assert!(record.errors.iter().any(|e| e.starts_with(kind.as_str())));
            }
            // Deterministic judges still score
            assert_eq!(
                record.verdict(JudgeKind::SyntaxValidity).unwrap().value,
                VerdictValue::Yes
            );
        }

        assert_eq!(records[0].verdict(JudgeKind::Arbiter).unwrap().value, VerdictValue::Skipped);
        assert_eq!(records[1].verdict(JudgeKind::Arbiter).unwrap().value, VerdictValue::Unknown);
        // Four reasoning judges per question plus one arbiter, two attempts each
        assert_eq!(model.calls.load(Ordering::SeqCst), (4 * 2 + 1) * 2);
    }

    /// Answers "drifting" with a different query on every call
    struct DriftingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryGenerator for DriftingGenerator {
        async fn generate(&self, question: &str) -> Result<String, CollaboratorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match question {
                "drifting" => Ok(format!("SELECT {call} AS total FROM sales")),
                _ => Ok("SELECT 1 AS total".to_string()),
            }
        }
    }

    #[tokio::test]
    async fn test_repeatability_check_regenerates_each_question() {
        let (model, executor) = fixture();
        let generator = Arc::new(DriftingGenerator {
            calls: AtomicUsize::new(0),
        });
        let client = Arc::new(JudgeClient::new(
            model,
            Arc::new(CallSpacing::from_millis(0)),
            RetryPolicy::new(1, 1, 2),
        ));
        let evaluator = Evaluator::new(
            generator.clone(),
            executor,
            standard_judges(client, Arc::new(JudgeProfile::builtin())),
            Arc::new(CallSpacing::from_millis(0)),
            RetryPolicy::new(1, 1, 2),
            2,
        );
        let questions = vec![
            BenchmarkQuestion::new("steady", "steady", "SELECT total FROM expected"),
            BenchmarkQuestion::new("drift", "drifting", "SELECT total FROM expected"),
        ];
        let records = evaluator.evaluate(&questions).await;
        let generated = generator.calls.load(Ordering::SeqCst);

        let checks = evaluator
            .check_repeatability(&questions, &records, 2, &CancellationToken::new())
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), generated + 4);
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].question_id, "steady");
        assert_eq!(checks[0].runs, 3);
        assert_eq!(checks[0].class, crate::domain::models::RepeatabilityClass::Identical);
        assert_eq!(checks[1].distinct_queries, 3);
        assert_eq!(checks[1].class, crate::domain::models::RepeatabilityClass::CriticalVariance);

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let checks = evaluator
            .check_repeatability(&questions, &records, 2, &cancelled)
            .await;
        assert!(checks.iter().all(|c| c.runs == 1));
    }
}

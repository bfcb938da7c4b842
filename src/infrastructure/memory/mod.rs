//! In-memory adapters for every port.
//!
//! Used by tests and dry runs. Write failures can be injected per object to
//! exercise rollback paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{
    ApplyLog, BenchmarkQuestion, EvaluationRecord, MetadataObject, ResultSet, RunSummary,
};
use crate::domain::ports::{
    BenchmarkRepository, CollaboratorError, ConfigMirror, MetadataStore, ProposalHistory,
    QueryExecutor, QueryGenerator, ReasoningModel, RunStore,
};

/// Objects keyed by id, with injectable write failures
#[derive(Debug, Default)]
struct ObjectMap {
    objects: RwLock<BTreeMap<String, MetadataObject>>,
    failing: RwLock<BTreeSet<String>>,
    writes: AtomicUsize,
}

impl ObjectMap {
    fn new(objects: impl IntoIterator<Item = MetadataObject>) -> Self {
        Self {
            objects: RwLock::new(objects.into_iter().map(|o| (o.id.clone(), o)).collect()),
            ..Default::default()
        }
    }

    async fn check_writable(&self, id: &str) -> Result<(), CollaboratorError> {
        if self.failing.read().await.contains(id) {
            return Err(CollaboratorError::Storage(format!("write to {id} refused")));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<MetadataObject> {
        self.objects.read().await.get(id).cloned()
    }

    async fn put(&self, object: &MetadataObject) -> Result<(), CollaboratorError> {
        self.check_writable(&object.id).await?;
        self.objects
            .write()
            .await
            .insert(object.id.clone(), object.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), CollaboratorError> {
        self.check_writable(id).await?;
        self.objects.write().await.remove(id);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Live metadata catalog held in memory
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    inner: ObjectMap,
}

impl InMemoryMetadataStore {
    pub fn new(objects: impl IntoIterator<Item = MetadataObject>) -> Self {
        Self {
            inner: ObjectMap::new(objects),
        }
    }

    /// Make every later write to `id` fail.
    pub async fn fail_writes_for(&self, id: &str) {
        self.inner.failing.write().await.insert(id.to_string());
    }

    pub async fn snapshot(&self) -> BTreeMap<String, MetadataObject> {
        self.inner.objects.read().await.clone()
    }

    /// Successful writes so far
    pub async fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError> {
        Ok(self.inner.get(id).await)
    }

    async fn list(&self) -> Result<Vec<MetadataObject>, CollaboratorError> {
        Ok(self.inner.objects.read().await.values().cloned().collect())
    }

    async fn replace(&self, object: &MetadataObject) -> Result<(), CollaboratorError> {
        self.inner.put(object).await
    }

    async fn remove(&self, id: &str) -> Result<(), CollaboratorError> {
        self.inner.delete(id).await
    }
}

/// Versioned mirror held in memory
#[derive(Debug, Default)]
pub struct InMemoryConfigMirror {
    inner: ObjectMap,
}

impl InMemoryConfigMirror {
    pub fn new(objects: impl IntoIterator<Item = MetadataObject>) -> Self {
        Self {
            inner: ObjectMap::new(objects),
        }
    }

    pub async fn fail_writes_for(&self, id: &str) {
        self.inner.failing.write().await.insert(id.to_string());
    }

    pub async fn snapshot(&self) -> BTreeMap<String, MetadataObject> {
        self.inner.objects.read().await.clone()
    }
}

#[async_trait]
impl ConfigMirror for InMemoryConfigMirror {
    async fn read(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError> {
        Ok(self.inner.get(id).await)
    }

    async fn write(&self, object: &MetadataObject) -> Result<(), CollaboratorError> {
        self.inner.put(object).await
    }

    async fn remove(&self, id: &str) -> Result<(), CollaboratorError> {
        self.inner.delete(id).await
    }
}

/// Benchmark definitions held in memory
#[derive(Debug, Default)]
pub struct InMemoryBenchmarkRepository {
    questions: RwLock<Vec<BenchmarkQuestion>>,
}

impl InMemoryBenchmarkRepository {
    pub fn new(questions: Vec<BenchmarkQuestion>) -> Self {
        Self {
            questions: RwLock::new(questions),
        }
    }

    pub async fn questions(&self) -> Vec<BenchmarkQuestion> {
        self.questions.read().await.clone()
    }
}

#[async_trait]
impl BenchmarkRepository for InMemoryBenchmarkRepository {
    async fn load(&self) -> Result<Vec<BenchmarkQuestion>, CollaboratorError> {
        Ok(self.questions().await)
    }

    async fn rewrite_expected(&self, question: &BenchmarkQuestion) -> Result<(), CollaboratorError> {
        let mut questions = self.questions.write().await;
        let slot = questions
            .iter_mut()
            .find(|q| q.id == question.id)
            .ok_or_else(|| CollaboratorError::NotFound(question.id.clone()))?;
        *slot = question.clone();
        Ok(())
    }
}

/// Run artifacts held in memory, never overwritten
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<BTreeMap<String, (RunSummary, Vec<EvaluationRecord>)>>,
    rollbacks: RwLock<BTreeMap<String, ApplyLog>>,
    history: RwLock<ProposalHistory>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self, run_id: &str) -> Option<Vec<EvaluationRecord>> {
        self.runs.read().await.get(run_id).map(|(_, r)| r.clone())
    }

    pub async fn rollback_log(&self, run_id: &str) -> Option<ApplyLog> {
        self.rollbacks.read().await.get(run_id).cloned()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_run(
        &self,
        summary: &RunSummary,
        records: &[EvaluationRecord],
    ) -> Result<(), CollaboratorError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&summary.run_id) {
            return Err(CollaboratorError::Storage(format!(
                "run {} already exists",
                summary.run_id
            )));
        }
        runs.insert(summary.run_id.clone(), (summary.clone(), records.to_vec()));
        Ok(())
    }

    async fn load_summary(&self, run_id: &str) -> Result<RunSummary, CollaboratorError> {
        self.runs
            .read()
            .await
            .get(run_id)
            .map(|(summary, _)| summary.clone())
            .ok_or_else(|| CollaboratorError::NotFound(run_id.to_string()))
    }

    async fn save_rollback(&self, run_id: &str, log: &ApplyLog) -> Result<(), CollaboratorError> {
        let mut rollbacks = self.rollbacks.write().await;
        if rollbacks.contains_key(run_id) {
            return Err(CollaboratorError::Storage(format!(
                "run {run_id} already rolled back"
            )));
        }
        rollbacks.insert(run_id.to_string(), log.clone());
        Ok(())
    }

    async fn load_history(&self) -> Result<ProposalHistory, CollaboratorError> {
        Ok(self.history.read().await.clone())
    }

    async fn save_history(&self, history: &ProposalHistory) -> Result<(), CollaboratorError> {
        *self.history.write().await = history.clone();
        Ok(())
    }
}

/// Query generator answering from a fixed question-to-query table
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    answers: HashMap<String, String>,
}

impl ScriptedGenerator {
    pub fn new<I, Q, A>(answers: I) -> Self
    where
        I: IntoIterator<Item = (Q, A)>,
        Q: Into<String>,
        A: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(q, a)| (q.into(), a.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl QueryGenerator for ScriptedGenerator {
    async fn generate(&self, question: &str) -> Result<String, CollaboratorError> {
        self.answers
            .get(question)
            .cloned()
            .ok_or_else(|| CollaboratorError::Rejected(format!("no answer for '{question}'")))
    }
}

/// Query executor answering from a query-to-result table
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    results: RwLock<HashMap<String, ResultSet>>,
    unplannable: RwLock<HashSet<String>>,
    executions: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new<I, Q>(results: I) -> Self
    where
        I: IntoIterator<Item = (Q, ResultSet)>,
        Q: Into<String>,
    {
        Self {
            results: RwLock::new(
                results
                    .into_iter()
                    .map(|(q, r)| (q.into().trim().to_string(), r))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub async fn set_result(&self, query: &str, result: ResultSet) {
        self.results
            .write()
            .await
            .insert(query.trim().to_string(), result);
    }

    /// Make `explain` fail for a known query.
    pub async fn mark_unplannable(&self, query: &str) {
        self.unplannable.write().await.insert(query.trim().to_string());
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &str) -> Result<ResultSet, CollaboratorError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.results
            .read()
            .await
            .get(query.trim())
            .cloned()
            .ok_or_else(|| CollaboratorError::QueryFailed(format!("Table or view not found: {query}")))
    }

    async fn explain(&self, query: &str) -> Result<(), CollaboratorError> {
        let query = query.trim();
        if self.unplannable.read().await.contains(query) || !self.results.read().await.contains_key(query) {
            return Err(CollaboratorError::QueryFailed(format!(
                "Table or view not found: {query}"
            )));
        }
        Ok(())
    }
}

type Responder = dyn Fn(&str) -> Result<String, CollaboratorError> + Send + Sync;

/// Reasoning model driven by a closure over the prompt
pub struct ScriptedReasoningModel {
    respond: Arc<Responder>,
    calls: AtomicUsize,
}

impl ScriptedReasoningModel {
    pub fn new(respond: impl Fn(&str) -> Result<String, CollaboratorError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Arc::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    /// Model that approves every reasoning judge and sides with the expected
    /// query in every arbitration.
    pub fn agreeable() -> Self {
        Self::new(|prompt| {
            if prompt.contains("adjudicate") {
                Ok(r#"{"verdict": "ground_truth_correct", "rationale": "expected query is right", "failure_type": "other", "severity": "major", "confidence": 0.6}"#.to_string())
            } else {
                Ok(r#"{"verdict": "yes", "rationale": "looks right"}"#.to_string())
            }
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ScriptedReasoningModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedReasoningModel")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ReasoningModel for ScriptedReasoningModel {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(prompt)
    }
}

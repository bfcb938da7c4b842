//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use tuneloop::domain::models::{
    Config, JudgeProfile, MetadataObject, ObjectKind, ResultSet, Value,
};
use tuneloop::domain::ports::{QueryGenerator, ReasoningModel};
use tuneloop::infrastructure::memory::{
    InMemoryBenchmarkRepository, InMemoryConfigMirror, InMemoryMetadataStore, InMemoryRunStore,
    ScriptedExecutor,
};
use tuneloop::services::{Collaborators, Orchestrator};

/// Configuration with no call spacing, fast retries and a tiny benchmark floor
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.generation_interval_ms = 0;
    config.rate_limit.reasoning_interval_ms = 0;
    config.retry.max_retries = 1;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 2;
    config.evaluation.min_benchmarks = 1;
    config.evaluation.max_concurrency = 2;
    config
}

/// Single-column result
pub fn scalar(column: &str, value: i64) -> ResultSet {
    ResultSet::new(vec![column.to_string()], vec![vec![Value::Int(value)]])
}

pub fn sales_catalog() -> Vec<MetadataObject> {
    vec![
        MetadataObject::new("sales", ObjectKind::Entity, "One row per order line"),
        MetadataObject::new(
            "sales.revenue_column",
            ObjectKind::Column,
            "Revenue of the order line",
        ),
        MetadataObject::new(
            "mv_sales",
            ObjectKind::View,
            "SELECT region, SUM(amount) AS revenue FROM sales GROUP BY region",
        ),
        MetadataObject::new("stores", ObjectKind::Entity, "One row per store")
            .with_tags(["compliance"]),
    ]
}

/// In-memory collaborators whose state tests can inspect afterwards
pub struct Harness {
    pub metadata: Arc<InMemoryMetadataStore>,
    pub mirror: Arc<InMemoryConfigMirror>,
    pub benchmarks: Arc<InMemoryBenchmarkRepository>,
    pub runs: Arc<InMemoryRunStore>,
    pub executor: Arc<ScriptedExecutor>,
}

impl Harness {
    pub fn new(
        catalog: Vec<MetadataObject>,
        questions: Vec<tuneloop::BenchmarkQuestion>,
        executor: ScriptedExecutor,
    ) -> Self {
        Self {
            metadata: Arc::new(InMemoryMetadataStore::new(catalog.clone())),
            mirror: Arc::new(InMemoryConfigMirror::new(catalog)),
            benchmarks: Arc::new(InMemoryBenchmarkRepository::new(questions)),
            runs: Arc::new(InMemoryRunStore::new()),
            executor: Arc::new(executor),
        }
    }

    pub fn orchestrator(
        &self,
        config: Config,
        generator: Arc<dyn QueryGenerator>,
        reasoning: Arc<dyn ReasoningModel>,
    ) -> Orchestrator {
        let collaborators = Collaborators {
            generator,
            executor: self.executor.clone(),
            reasoning,
            metadata: self.metadata.clone(),
            mirror: self.mirror.clone(),
            benchmarks: self.benchmarks.clone(),
            runs: self.runs.clone(),
        };
        Orchestrator::new(config, collaborators, Arc::new(JudgeProfile::builtin()))
    }
}

//! A run against the file-backed adapters in a temporary workspace.

mod common;

use std::sync::Arc;

use common::{scalar, test_config};
use tempfile::TempDir;
use tuneloop::domain::models::{ApplyOutcome, JudgeProfile, MetadataObject, ObjectKind};
use tuneloop::domain::ports::{ConfigMirror, MetadataStore};
use tuneloop::infrastructure::fs::{
    JsonMetadataStore, JsonRunStore, YamlBenchmarkRepository, YamlConfigMirror,
};
use tuneloop::infrastructure::memory::{
    ScriptedExecutor, ScriptedGenerator, ScriptedReasoningModel,
};
use tuneloop::services::{Collaborators, Orchestrator};
use tuneloop::{DomainError, RunOptions, Scope};

const BENCHMARKS: &str = r"
benchmarks:
  - id: q1
    question: What is total revenue?
    expected_query: SELECT SUM(revenue_column) FROM sales
    tags: [sales.revenue_column]
  - id: q2
    question: How much revenue did we book?
    expected_query: SELECT SUM(revenue_column) FROM sales
    tier: critical
    tags: [sales.revenue_column]
";

const CORRECT: &str = "SELECT SUM(revenue_column) FROM sales";
const WRONG: &str = "SELECT SUM(amount_gross) FROM sales";

struct Workspace {
    _dir: TempDir,
    orchestrator: Orchestrator,
    metadata: Arc<JsonMetadataStore>,
    mirror: Arc<YamlConfigMirror>,
    runs: Arc<JsonRunStore>,
}

/// `q2_answer` is what the generator returns for the second question.
async fn workspace(q2_answer: &str) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let benchmarks_path = dir.path().join("benchmarks.yaml");
    let catalog_path = dir.path().join("catalog.json");
    let mirror_dir = dir.path().join("mirror");
    let artifacts_dir = dir.path().join("artifacts");
    tokio::fs::write(&benchmarks_path, BENCHMARKS).await.unwrap();
    tokio::fs::create_dir_all(&mirror_dir).await.unwrap();

    let catalog = vec![
        MetadataObject::new("sales", ObjectKind::Entity, "One row per order line"),
        MetadataObject::new(
            "sales.revenue_column",
            ObjectKind::Column,
            "Revenue of the order line",
        ),
    ];
    tokio::fs::write(&catalog_path, serde_json::to_vec_pretty(&catalog).unwrap())
        .await
        .unwrap();
    let mirror = Arc::new(YamlConfigMirror::new(&mirror_dir));
    for object in &catalog {
        mirror.write(object).await.unwrap();
    }

    let metadata = Arc::new(JsonMetadataStore::new(&catalog_path));
    let runs = Arc::new(JsonRunStore::new(&artifacts_dir));
    let executor = Arc::new(ScriptedExecutor::new([
        ("SELECT SUM(revenue_column) FROM sales", scalar("revenue", 100)),
        ("SELECT SUM(amount_gross) FROM sales", scalar("revenue", 140)),
    ]));
    let generator = Arc::new(ScriptedGenerator::new([
        ("What is total revenue?", "```sql\nSELECT SUM(amount_gross) FROM sales;\n```"),
        ("How much revenue did we book?", q2_answer),
    ]));
    let collaborators = Collaborators {
        generator,
        executor,
        reasoning: Arc::new(ScriptedReasoningModel::agreeable()),
        metadata: metadata.clone(),
        mirror: mirror.clone(),
        benchmarks: Arc::new(YamlBenchmarkRepository::new(&benchmarks_path)),
        runs: runs.clone(),
    };
    let orchestrator =
        Orchestrator::new(test_config(), collaborators, Arc::new(JudgeProfile::builtin()));

    Workspace {
        _dir: dir,
        orchestrator,
        metadata,
        mirror,
        runs,
    }
}

#[tokio::test]
async fn test_evaluate_writes_immutable_artifacts() {
    let ws = workspace(CORRECT).await;

    let summary = ws
        .orchestrator
        .run(RunOptions::evaluate_only(Scope::Full))
        .await
        .unwrap();
    assert_eq!(summary.evaluated, 2);
    assert!((summary.accuracy - 0.5).abs() < f64::EPSILON);

    let run_dir = ws.runs.run_dir(&summary.run_id);
    assert!(run_dir.join("summary.json").exists());
    assert!(!run_dir.join("apply_log.json").exists());

    let records = ws.runs.load_records(&summary.run_id).await.unwrap();
    let q1 = records.iter().find(|r| r.question_id == "q1").unwrap();
    assert_eq!(
        q1.generated_query.as_deref(),
        Some("SELECT SUM(amount_gross) FROM sales")
    );
    assert_eq!(ws.runs.list_runs().await.unwrap(), vec![summary.run_id.clone()]);
}

#[tokio::test]
async fn test_critical_scope_reads_tiers_from_yaml() {
    let ws = workspace(CORRECT).await;

    let summary = ws
        .orchestrator
        .run(RunOptions::evaluate_only(Scope::Tier {
            tier: tuneloop::domain::models::PriorityTier::Critical,
        }))
        .await
        .unwrap();
    assert_eq!(summary.total_questions, 1);
    assert!((summary.accuracy - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_single_failure_proposes_nothing() {
    let ws = workspace(CORRECT).await;
    let catalog_before = ws.metadata.list().await.unwrap();

    let summary = ws
        .orchestrator
        .run(RunOptions::optimize(Scope::Full))
        .await
        .unwrap();

    assert!(summary.clusters.clusters.is_empty());
    assert_eq!(summary.clusters.long_tail, vec!["q1"]);
    assert!(matches!(summary.apply, ApplyOutcome::NotAttempted { .. }));
    assert_eq!(ws.metadata.list().await.unwrap(), catalog_before);
}

#[tokio::test]
async fn test_applied_instruction_is_mirrored_and_reverted() {
    let ws = workspace(WRONG).await;
    let catalog_before = ws.metadata.list().await.unwrap();

    let summary = ws
        .orchestrator
        .run(RunOptions::optimize(Scope::Full))
        .await
        .unwrap();

    let ApplyOutcome::Applied { log, .. } = &summary.apply else {
        panic!("expected applied outcome, got {}", summary.apply.as_str());
    };
    let target = &log.entries[0].target;
    let live = ws.metadata.get(target).await.unwrap().unwrap();
    assert_eq!(live.kind, ObjectKind::Instructions);
    assert_eq!(ws.mirror.read(target).await.unwrap(), Some(live));
    assert!(ws.mirror.file_for(target).exists());
    assert!(ws.runs.run_dir(&summary.run_id).join("apply_log.json").exists());

    ws.orchestrator.rollback_run(&summary.run_id).await.unwrap();
    assert_eq!(ws.metadata.list().await.unwrap(), catalog_before);
    assert!(ws.mirror.read(target).await.unwrap().is_none());
    assert!(ws.runs.run_dir(&summary.run_id).join("rollback.json").exists());

    // A second rollback of the same run is refused by the write-once store.
    assert!(ws.orchestrator.rollback_run(&summary.run_id).await.is_err());
}

#[tokio::test]
async fn test_corrupt_summary_is_a_storage_error_not_a_missing_run() {
    let ws = workspace(CORRECT).await;
    let summary = ws
        .orchestrator
        .run(RunOptions::evaluate_only(Scope::Full))
        .await
        .unwrap();
    let summary_path = ws.runs.run_dir(&summary.run_id).join("summary.json");
    tokio::fs::write(&summary_path, "{ truncated").await.unwrap();

    let err = ws.orchestrator.rollback_run(&summary.run_id).await.unwrap_err();
    assert!(matches!(err, DomainError::Storage(_)), "got {err:?}");

    let err = ws.orchestrator.rollback_run("20240101T000000-00000000").await.unwrap_err();
    assert!(matches!(err, DomainError::RunNotFound(_)));
}

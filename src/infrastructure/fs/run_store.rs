use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::write_atomic;
use crate::domain::models::{ApplyLog, EvaluationRecord, RunSummary};
use crate::domain::ports::{CollaboratorError, ProposalHistory, RunStore};

const SUMMARY_FILE: &str = "summary.json";
const RECORDS_FILE: &str = "records.json";
const APPLY_LOG_FILE: &str = "apply_log.json";
const ROLLBACK_FILE: &str = "rollback.json";
const HISTORY_FILE: &str = "proposal_history.json";

/// Run artifacts as pretty JSON under `<root>/runs/<run-id>/`.
///
/// Artifacts are write-once: saving a run whose directory already exists, or
/// recording a second rollback, fails.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    root: PathBuf,
}

impl JsonRunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    /// Per-question records of a finished run
    pub async fn load_records(&self, run_id: &str) -> Result<Vec<EvaluationRecord>, CollaboratorError> {
        read_json(&self.run_dir(run_id).join(RECORDS_FILE)).await
    }

    /// Run ids in chronological order
    pub async fn list_runs(&self) -> Result<Vec<String>, CollaboratorError> {
        let runs = self.root.join("runs");
        let mut entries = match tokio::fs::read_dir(&runs).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        // run ids start with a sortable timestamp
        ids.sort();
        Ok(ids)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CollaboratorError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CollaboratorError::NotFound(path.display().to_string())
        } else {
            CollaboratorError::Storage(format!("{}: {e}", path.display()))
        }
    })?;
    serde_json::from_str(&text)
        .map_err(|e| CollaboratorError::InvalidResponse(format!("{}: {e}", path.display())))
}

/// Write a file that must not exist yet
async fn create_new_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CollaboratorError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| CollaboratorError::Storage(e.to_string()))?;
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                CollaboratorError::Storage(format!("{} already exists", path.display()))
            } else {
                CollaboratorError::Storage(format!("{}: {e}", path.display()))
            }
        })?;
    file.write_all(&json).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl RunStore for JsonRunStore {
    async fn save_run(
        &self,
        summary: &RunSummary,
        records: &[EvaluationRecord],
    ) -> Result<(), CollaboratorError> {
        let dir = self.run_dir(&summary.run_id);
        tokio::fs::create_dir_all(self.root.join("runs")).await?;
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                CollaboratorError::Storage(format!("run {} already exists", summary.run_id))
            } else {
                CollaboratorError::Storage(format!("{}: {e}", dir.display()))
            }
        })?;

        create_new_json(&dir.join(SUMMARY_FILE), summary).await?;
        create_new_json(&dir.join(RECORDS_FILE), records).await?;
        if let Some(log) = summary.combined_apply_log() {
            create_new_json(&dir.join(APPLY_LOG_FILE), &log).await?;
        }

        info!(run_id = %summary.run_id, path = %dir.display(), "run artifacts written");
        Ok(())
    }

    async fn load_summary(&self, run_id: &str) -> Result<RunSummary, CollaboratorError> {
        read_json(&self.run_dir(run_id).join(SUMMARY_FILE)).await
    }

    async fn save_rollback(&self, run_id: &str, log: &ApplyLog) -> Result<(), CollaboratorError> {
        let dir = self.run_dir(run_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(CollaboratorError::NotFound(run_id.to_string()));
        }
        create_new_json(&dir.join(ROLLBACK_FILE), log).await
    }

    async fn load_history(&self) -> Result<ProposalHistory, CollaboratorError> {
        match read_json(&self.root.join(HISTORY_FILE)).await {
            Err(CollaboratorError::NotFound(_)) => Ok(ProposalHistory::default()),
            other => other,
        }
    }

    async fn save_history(&self, history: &ProposalHistory) -> Result<(), CollaboratorError> {
        let json =
            serde_json::to_vec_pretty(history).map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        write_atomic(&self.root.join(HISTORY_FILE), &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ApplyOutcome, ClusterReport, Scope, StopReason};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn summary(run_id: &str) -> RunSummary {
        RunSummary {
            run_id: run_id.to_string(),
            scope: Scope::Full,
            judge_profile: "builtin".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total_questions: 0,
            evaluated: 0,
            excluded: Vec::new(),
            warnings: Vec::new(),
            judge_scores: BTreeMap::new(),
            accuracy: 0.0,
            thresholds_met: false,
            arbiter_outcomes: BTreeMap::new(),
            corrections: Vec::new(),
            clusters: ClusterReport::default(),
            proposals: Vec::new(),
            recommendations: Vec::new(),
            validation: None,
            apply: ApplyOutcome::NotAttempted {
                reason: "no proposals".to_string(),
            },
            errors: Vec::new(),
            repeatability: None,
            iterations: Vec::new(),
            best_iteration: 1,
            stop_reason: StopReason::EvaluationOnly,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());

        store.save_run(&summary("20260101T000000-aaaa"), &[]).await.unwrap();

        let loaded = store.load_summary("20260101T000000-aaaa").await.unwrap();
        assert_eq!(loaded.run_id, "20260101T000000-aaaa");
        assert!(store.load_records("20260101T000000-aaaa").await.unwrap().is_empty());
        assert!(!store.run_dir("20260101T000000-aaaa").join(APPLY_LOG_FILE).exists());
    }

    #[tokio::test]
    async fn test_run_artifacts_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.save_run(&summary("r1"), &[]).await.unwrap();

        let err = store.save_run(&summary("r1"), &[]).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_second_rollback_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.save_run(&summary("r1"), &[]).await.unwrap();

        store.save_rollback("r1", &ApplyLog::default()).await.unwrap();
        assert!(store.save_rollback("r1", &ApplyLog::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_run_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        assert!(matches!(
            store.load_summary("nope").await,
            Err(CollaboratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        assert_eq!(store.load_history().await.unwrap(), ProposalHistory::default());

        let mut history = ProposalHistory::default();
        history.advance(["wrong_column:sales.revenue"]);
        store.save_history(&history).await.unwrap();
        assert_eq!(store.load_history().await.unwrap(), history);
    }

    #[tokio::test]
    async fn test_list_runs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRunStore::new(dir.path());
        store.save_run(&summary("20260102T000000-bbbb"), &[]).await.unwrap();
        store.save_run(&summary("20260101T000000-aaaa"), &[]).await.unwrap();

        assert_eq!(
            store.list_runs().await.unwrap(),
            vec!["20260101T000000-aaaa", "20260102T000000-bbbb"]
        );
    }
}

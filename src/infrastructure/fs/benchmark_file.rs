use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::write_atomic;
use crate::domain::models::BenchmarkQuestion;
use crate::domain::ports::{BenchmarkRepository, CollaboratorError};

/// Accepted on-disk shapes: a `benchmarks:` mapping or a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum BenchmarkDocument {
    Keyed { benchmarks: Vec<BenchmarkQuestion> },
    Bare(Vec<BenchmarkQuestion>),
}

#[derive(Serialize)]
struct KeyedDocument<'a> {
    benchmarks: &'a [BenchmarkQuestion],
}

/// Benchmarks stored in a single YAML file
#[derive(Debug)]
pub struct YamlBenchmarkRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlBenchmarkRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<BenchmarkQuestion>, CollaboratorError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CollaboratorError::Storage(format!("{}: {e}", self.path.display()))
        })?;
        let document: BenchmarkDocument = serde_yaml::from_str(&text).map_err(|e| {
            CollaboratorError::InvalidResponse(format!("{}: {e}", self.path.display()))
        })?;
        Ok(match document {
            BenchmarkDocument::Keyed { benchmarks } | BenchmarkDocument::Bare(benchmarks) => {
                benchmarks
            }
        })
    }
}

#[async_trait]
impl BenchmarkRepository for YamlBenchmarkRepository {
    async fn load(&self) -> Result<Vec<BenchmarkQuestion>, CollaboratorError> {
        let questions = self.read_all().await?;
        debug!(path = %self.path.display(), count = questions.len(), "loaded benchmarks");
        Ok(questions)
    }

    async fn rewrite_expected(&self, question: &BenchmarkQuestion) -> Result<(), CollaboratorError> {
        let _guard = self.write_lock.lock().await;
        let mut questions = self.read_all().await?;
        let slot = questions
            .iter_mut()
            .find(|q| q.id == question.id)
            .ok_or_else(|| CollaboratorError::NotFound(question.id.clone()))?;
        *slot = question.clone();

        let yaml = serde_yaml::to_string(&KeyedDocument {
            benchmarks: &questions,
        })
        .map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        write_atomic(&self.path, yaml.as_bytes()).await?;

        info!(
            question_id = %question.id,
            version = question.version,
            "rewrote expected query"
        );
        Ok(())
    }
}

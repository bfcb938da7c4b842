use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::CollaboratorError;
use crate::domain::models::{ApplyLog, EvaluationRecord, RunSummary};

/// Consecutive runs that proposed an edit for the same recurring failure,
/// keyed by cluster signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalHistory {
    pub streaks: BTreeMap<String, u32>,
}

impl ProposalHistory {
    pub fn streak(&self, signature: &str) -> u32 {
        self.streaks.get(signature).copied().unwrap_or(0)
    }

    /// Advance streaks for signatures proposed this run and drop the rest.
    pub fn advance<'a>(&mut self, proposed: impl IntoIterator<Item = &'a str>) {
        let next: BTreeMap<String, u32> = proposed
            .into_iter()
            .map(|sig| (sig.to_string(), self.streak(sig) + 1))
            .collect();
        self.streaks = next;
    }
}

/// Persistence for immutable run artifacts
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a finished run; fails if the run already exists
    async fn save_run(
        &self,
        summary: &RunSummary,
        records: &[EvaluationRecord],
    ) -> Result<(), CollaboratorError>;

    async fn load_summary(&self, run_id: &str) -> Result<RunSummary, CollaboratorError>;

    /// Record a manual rollback of a run's apply log
    async fn save_rollback(&self, run_id: &str, log: &ApplyLog) -> Result<(), CollaboratorError>;

    async fn load_history(&self) -> Result<ProposalHistory, CollaboratorError>;

    async fn save_history(&self, history: &ProposalHistory) -> Result<(), CollaboratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_streaks_reset_when_not_proposed() {
        let mut history = ProposalHistory::default();
        history.advance(["a", "b"]);
        history.advance(["a"]);
        assert_eq!(history.streak("a"), 2);
        assert_eq!(history.streak("b"), 0);
    }
}

//! Applies validated patch sets to the live store and the versioned mirror,
//! recording the exact inverse of every step.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::domain::models::{
    ApplyAction, ApplyLog, ApplyLogEntry, EntryStatus, InverseCommand, MetadataObject,
    PatchProposal, RiskLevel,
};
use crate::domain::ports::{CollaboratorError, ConfigMirror, MetadataStore};
use crate::services::patch_validator::ValidatedPatchSet;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Patch set has {0} risk and requires explicit confirmation")]
    ConfirmationRequired(RiskLevel),

    /// A step failed; earlier steps were reverted
    #[error("Apply failed at {proposal_id}: {message}")]
    Failed {
        log: ApplyLog,
        proposal_id: String,
        message: String,
    },

    /// An inverse command failed; entries before it in reverse order were reverted
    #[error("Rollback failed at {proposal_id}: {message}")]
    Rollback {
        log: ApplyLog,
        proposal_id: String,
        message: String,
    },
}

impl ApplyError {
    /// Log as it stood when the error occurred.
    pub const fn log(&self) -> Option<&ApplyLog> {
        match self {
            Self::ConfirmationRequired(_) => None,
            Self::Failed { log, .. } | Self::Rollback { log, .. } => Some(log),
        }
    }
}

/// Writes proposals one at a time to both persistence targets
#[derive(Clone)]
pub struct Applier {
    store: Arc<dyn MetadataStore>,
    mirror: Arc<dyn ConfigMirror>,
}

impl Applier {
    pub fn new(store: Arc<dyn MetadataStore>, mirror: Arc<dyn ConfigMirror>) -> Self {
        Self { store, mirror }
    }

    /// Apply every proposal in order.
    ///
    /// On a mid-set failure the failing step's partial write is undone, the
    /// already-applied steps are rolled back in reverse, and the error
    /// carries the log.
    #[instrument(skip_all, fields(proposals = set.proposals().len(), risk = %set.risk()))]
    pub async fn apply(&self, set: &ValidatedPatchSet, confirmed: bool) -> Result<ApplyLog, ApplyError> {
        if set.risk() == RiskLevel::High && !confirmed {
            return Err(ApplyError::ConfirmationRequired(set.risk()));
        }

        let mut log = ApplyLog::default();
        for proposal in set.proposals() {
            match self.apply_one(proposal).await {
                Ok(entry) => log.entries.push(entry),
                Err((entry, message)) => {
                    error!(proposal_id = %proposal.id, error = %message, "Apply step failed, rolling back");
                    log.entries.push(entry);
                    let message = match self.revert_applied(&mut log).await {
                        Ok(()) => message,
                        Err((failed_id, rollback_err)) => {
                            format!("{message}; rollback also failed at {failed_id}: {rollback_err}")
                        }
                    };
                    return Err(ApplyError::Failed {
                        log,
                        proposal_id: proposal.id.clone(),
                        message,
                    });
                }
            }
        }

        info!(
            applied = log.count(EntryStatus::Applied),
            no_op = log.count(EntryStatus::NoOp),
            "Patch set applied"
        );
        Ok(log)
    }

    /// Execute the inverse of every applied entry in strict reverse order.
    #[instrument(skip_all, fields(entries = log.len()))]
    pub async fn rollback(&self, log: &ApplyLog) -> Result<ApplyLog, ApplyError> {
        let mut log = log.clone();
        match self.revert_applied(&mut log).await {
            Ok(()) => {
                info!(rolled_back = log.count(EntryStatus::RolledBack), "Apply log rolled back");
                Ok(log)
            }
            Err((proposal_id, message)) => Err(ApplyError::Rollback {
                log,
                proposal_id,
                message,
            }),
        }
    }

    async fn apply_one(&self, proposal: &PatchProposal) -> Result<ApplyLogEntry, (ApplyLogEntry, String)> {
        let failed = |before: Option<MetadataObject>, error: &CollaboratorError| {
            let message = error.to_string();
            let entry = ApplyLogEntry {
                proposal_id: proposal.id.clone(),
                target: proposal.target.clone(),
                action: ApplyAction::NoOp,
                rollback: InverseCommand::Nothing,
                before,
                after: None,
                timestamp: Utc::now(),
                status: EntryStatus::Failed,
                error: Some(message.clone()),
            };
            (entry, message)
        };

        let before = self
            .store
            .get(&proposal.target)
            .await
            .map_err(|e| failed(None, &e))?;

        if before.as_ref().is_some_and(|b| b.value == proposal.new_value) {
            return Ok(ApplyLogEntry {
                proposal_id: proposal.id.clone(),
                target: proposal.target.clone(),
                action: ApplyAction::NoOp,
                rollback: InverseCommand::Nothing,
                before: before.clone(),
                after: before,
                timestamp: Utc::now(),
                status: EntryStatus::NoOp,
                error: None,
            });
        }

        let (after, action, rollback) = match &before {
            Some(object) => (
                object.with_value(proposal.new_value.clone()),
                ApplyAction::Replaced,
                InverseCommand::Restore {
                    object: object.clone(),
                },
            ),
            None => (
                MetadataObject::new(
                    proposal.target.clone(),
                    proposal.target_kind,
                    proposal.new_value.clone(),
                ),
                ApplyAction::Created,
                InverseCommand::Remove {
                    id: proposal.target.clone(),
                },
            ),
        };

        self.store
            .replace(&after)
            .await
            .map_err(|e| failed(before.clone(), &e))?;

        if let Err(mirror_err) = self.mirror.write(&after).await {
            if let Err(undo_err) = self.undo_live(&rollback).await {
                warn!(
                    object_id = %proposal.target,
                    error = %undo_err,
                    "Could not undo live write after mirror failure"
                );
            }
            return Err(failed(before, &mirror_err));
        }

        Ok(ApplyLogEntry {
            proposal_id: proposal.id.clone(),
            target: proposal.target.clone(),
            action,
            rollback,
            before,
            after: Some(after),
            timestamp: Utc::now(),
            status: EntryStatus::Applied,
            error: None,
        })
    }

    /// Revert the live write of a step whose mirror write failed.
    async fn undo_live(&self, inverse: &InverseCommand) -> Result<(), CollaboratorError> {
        match inverse {
            InverseCommand::Restore { object } => self.store.replace(object).await,
            InverseCommand::Remove { id } => self.store.remove(id).await,
            InverseCommand::Nothing => Ok(()),
        }
    }

    async fn run_inverse(&self, inverse: &InverseCommand) -> Result<(), CollaboratorError> {
        match inverse {
            InverseCommand::Restore { object } => {
                self.store.replace(object).await?;
                self.mirror.write(object).await
            }
            InverseCommand::Remove { id } => {
                self.store.remove(id).await?;
                self.mirror.remove(id).await
            }
            InverseCommand::Nothing => Ok(()),
        }
    }

    /// Run inverses of `Applied` entries in reverse, marking each rolled back.
    async fn revert_applied(&self, log: &mut ApplyLog) -> Result<(), (String, String)> {
        for entry in log.entries.iter_mut().rev() {
            if entry.status != EntryStatus::Applied {
                continue;
            }
            if let Err(err) = self.run_inverse(&entry.rollback).await {
                error!(proposal_id = %entry.proposal_id, error = %err, "Inverse command failed");
                return Err((entry.proposal_id.clone(), err.to_string()));
            }
            entry.status = EntryStatus::RolledBack;
            entry.timestamp = Utc::now();
        }
        Ok(())
    }
}

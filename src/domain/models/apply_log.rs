use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::MetadataObject;

/// What the applier did to the target object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyAction {
    /// Existing object replaced
    Replaced,
    /// Object did not exist and was created
    Created,
    /// Live value already equal to the new value
    NoOp,
}

impl ApplyAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Created => "created",
            Self::NoOp => "no_op",
        }
    }
}

/// Exact command that undoes one applied edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InverseCommand {
    /// Write this snapshot back to the live store and the mirror
    Restore { object: MetadataObject },
    /// Remove an object the edit created
    Remove { id: String },
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Applied,
    NoOp,
    Failed,
    RolledBack,
}

impl EntryStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::NoOp => "no_op",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// One step of an apply, with what is needed to undo it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyLogEntry {
    pub proposal_id: String,
    pub target: String,
    pub action: ApplyAction,
    pub rollback: InverseCommand,
    pub before: Option<MetadataObject>,
    pub after: Option<MetadataObject>,
    pub timestamp: DateTime<Utc>,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered record of an apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyLog {
    pub entries: Vec<ApplyLogEntry>,
}

impl ApplyLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

//! Domain errors for the Tuneloop evaluation and repair loop.

use thiserror::Error;

use super::models::RiskLevel;

/// Domain-level errors that stop a run or an operation.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Coverage failure: {surviving} benchmark questions survived pre-checks, at least {required} required")]
    CoverageFailure { surviving: usize, required: usize },

    #[error("Patch set rejected: {0}")]
    PatchSetRejected(String),

    #[error("Patch set has {0} risk and requires explicit confirmation")]
    ConfirmationRequired(RiskLevel),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Run {0} applied nothing that can be rolled back")]
    NothingToRollBack(String),

    #[error("Apply error: {0}")]
    Apply(String),

    #[error("Run artifact already exists: {0}")]
    ArtifactExists(String),

    #[error("Judge profile error: {0}")]
    JudgeProfile(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Run cancelled")]
    Cancelled,
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<super::ports::CollaboratorError> for DomainError {
    fn from(err: super::ports::CollaboratorError) -> Self {
        Self::Collaborator(err.to_string())
    }
}

pub mod apply_log;
pub mod benchmark;
pub mod cluster;
pub mod config;
pub mod evaluation;
pub mod judge_profile;
pub mod metadata;
pub mod patch;
pub mod repeatability;
pub mod result_set;
pub mod run;
pub mod verdict;

pub use apply_log::{ApplyAction, ApplyLog, ApplyLogEntry, EntryStatus, InverseCommand};
pub use benchmark::{BenchmarkQuestion, PriorityTier, QuestionSource, Scope};
pub use cluster::{ClusterEvidence, ClusterReport, FailureCluster};
pub use config::{
    Config, EvaluationConfig, JudgesConfig, LoggingConfig, OptimizerConfig, RateLimitConfig,
    ReasoningConfig, RetryConfig, ServicesConfig, StorageConfig,
};
pub use evaluation::EvaluationRecord;
pub use judge_profile::{JudgeProfile, BUILTIN_PROFILE};
pub use metadata::{MetadataObject, ObjectKind};
pub use patch::{
    ApplyPolicy, Conflict, ControlLever, PatchProposal, PatchSet, PatchType, RiskLevel,
    StructuralRecommendation, ValidationResult,
};
pub use repeatability::{
    CrossIterationReport, RepeatabilityCheck, RepeatabilityClass, RepeatabilityReport,
};
pub use result_set::{Comparison, MatchType, ResultSet, ResultSignature, Value};
pub use run::{
    judge_scores, ApplyOutcome, BenchmarkCorrection, ExcludedQuestion, IterationSummary,
    JudgeScore, RunSummary, StopReason, VerificationReport,
};
pub use verdict::{
    ArbiterOutcome, AsiFeedback, FailureType, JudgeKind, Severity, Verdict, VerdictValue,
};

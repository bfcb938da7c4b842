//! The externally observable result of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::apply_log::{ApplyLog, EntryStatus};
use super::benchmark::Scope;
use super::cluster::ClusterReport;
use super::evaluation::EvaluationRecord;
use super::patch::{PatchProposal, StructuralRecommendation, ValidationResult};
use super::repeatability::{CrossIterationReport, RepeatabilityReport};
use super::verdict::{JudgeKind, VerdictValue};

/// Tally of one judge's verdicts over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub passed: usize,
    pub failed: usize,
    pub unknown: usize,
    pub skipped: usize,
    /// Passed over scored verdicts; skipped verdicts are excluded and unknown
    /// verdicts count against the judge. `None` when nothing was scored.
    pub pass_rate: Option<f64>,
}

impl JudgeScore {
    #[allow(clippy::cast_precision_loss)]
    pub fn tally(records: &[EvaluationRecord], judge: JudgeKind) -> Self {
        let mut score = Self::default();
        for verdict in records.iter().filter_map(|r| r.verdict(judge)) {
            match verdict.value {
                VerdictValue::Yes => score.passed += 1,
                VerdictValue::No => score.failed += 1,
                VerdictValue::Unknown => score.unknown += 1,
                VerdictValue::Skipped => score.skipped += 1,
            }
        }
        let scored = score.passed + score.failed + score.unknown;
        if scored > 0 {
            score.pass_rate = Some(score.passed as f64 / scored as f64);
        }
        score
    }
}

/// Pass rates for every panel judge, in judge order, plus repeatability when
/// any record carries it.
pub fn judge_scores(records: &[EvaluationRecord]) -> BTreeMap<JudgeKind, JudgeScore> {
    let repeatability = records
        .iter()
        .any(|r| r.verdict(JudgeKind::Repeatability).is_some())
        .then_some(JudgeKind::Repeatability);
    JudgeKind::PANEL
        .into_iter()
        .chain(repeatability)
        .map(|kind| (kind, JudgeScore::tally(records, kind)))
        .collect()
}

/// A question dropped by the benchmark pre-check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedQuestion {
    pub question_id: String,
    pub reason: String,
}

/// An expected query rewritten on the arbiter's verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkCorrection {
    pub question_id: String,
    pub old_query: String,
    pub new_query: String,
    pub new_version: u32,
    /// Reported only; the benchmark was left unchanged
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

/// Result of the post-apply verification gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub questions: usize,
    pub baseline: BTreeMap<JudgeKind, f64>,
    pub after: BTreeMap<JudgeKind, f64>,
    /// Judges whose pass rate dropped beyond tolerance
    pub regressions: Vec<String>,
    /// Critical questions that passed before and fail now
    pub critical_failures: Vec<String>,
    pub passed: bool,
}

/// What happened to the selected patch set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    NotAttempted {
        reason: String,
    },
    /// Validation failed; nothing was written
    Rejected {
        reason: String,
    },
    AwaitingConfirmation,
    DryRun,
    Applied {
        log: ApplyLog,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<VerificationReport>,
    },
    /// Applied, then reverted by the verification gate
    RolledBack {
        log: ApplyLog,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<VerificationReport>,
    },
    /// Apply failed midway and was reverted
    Failed {
        log: ApplyLog,
        error: String,
    },
}

impl ApplyOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted { .. } => "not_attempted",
            Self::Rejected { .. } => "rejected",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::DryRun => "dry_run",
            Self::Applied { .. } => "applied",
            Self::RolledBack { .. } => "rolled_back",
            Self::Failed { .. } => "failed",
        }
    }

    /// Log of applied entries, if anything was written.
    pub const fn log(&self) -> Option<&ApplyLog> {
        match self {
            Self::Applied { log, .. } | Self::RolledBack { log, .. } | Self::Failed { log, .. } => {
                Some(log)
            }
            _ => None,
        }
    }
}

/// Why the iteration loop stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every judge threshold was met
    Converged,
    /// No failing verdict was left to repair
    NoFailures,
    /// Accuracy did not improve on the best iteration for too long
    Stalled,
    /// The last repair wrote nothing, so another pass would repeat this one
    NothingApplied,
    #[default]
    MaxIterations,
    EvaluationOnly,
    DryRun,
    Cancelled,
}

impl StopReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::NoFailures => "no_failures",
            Self::Stalled => "stalled",
            Self::NothingApplied => "nothing_applied",
            Self::MaxIterations => "max_iterations",
            Self::EvaluationOnly => "evaluation_only",
            Self::DryRun => "dry_run",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluate, diagnose and repair pass of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// 1-based
    pub iteration: usize,
    pub evaluated: usize,
    pub accuracy: f64,
    pub thresholds_met: bool,
    /// Questions with at least one failing verdict
    pub failing_questions: usize,
    pub clusters: usize,
    pub proposals: usize,
    pub apply: ApplyOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_iteration: Option<CrossIterationReport>,
}

/// Structured summary returned by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub scope: Scope,
    pub judge_profile: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_questions: usize,
    pub evaluated: usize,
    pub excluded: Vec<ExcludedQuestion>,
    pub warnings: Vec<String>,
    pub judge_scores: BTreeMap<JudgeKind, JudgeScore>,
    /// Result-correctness pass rate
    pub accuracy: f64,
    pub thresholds_met: bool,
    pub arbiter_outcomes: BTreeMap<String, usize>,
    pub corrections: Vec<BenchmarkCorrection>,
    pub clusters: ClusterReport,
    pub proposals: Vec<PatchProposal>,
    pub recommendations: Vec<StructuralRecommendation>,
    pub validation: Option<ValidationResult>,
    pub apply: ApplyOutcome,
    /// Per-question errors aggregated from the records
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeatability: Option<RepeatabilityReport>,
    /// Every pass of the loop, in order; the fields above describe the last
    #[serde(default)]
    pub iterations: Vec<IterationSummary>,
    /// Iteration with the highest accuracy, the earliest on ties
    #[serde(default)]
    pub best_iteration: usize,
    #[serde(default)]
    pub stop_reason: StopReason,
}

impl RunSummary {
    /// Apply outcome of every iteration, oldest first.
    fn outcomes(&self) -> Vec<&ApplyOutcome> {
        if self.iterations.is_empty() {
            vec![&self.apply]
        } else {
            self.iterations.iter().map(|i| &i.apply).collect()
        }
    }

    /// Apply logs that still hold applied entries, oldest first.
    pub fn applied_logs(&self) -> Vec<&ApplyLog> {
        self.outcomes()
            .into_iter()
            .filter_map(ApplyOutcome::log)
            .filter(|log| log.count(EntryStatus::Applied) > 0)
            .collect()
    }

    /// Every iteration's apply log concatenated, or `None` when nothing was
    /// attempted.
    pub fn combined_apply_log(&self) -> Option<ApplyLog> {
        let logs: Vec<&ApplyLog> = self.outcomes().into_iter().filter_map(ApplyOutcome::log).collect();
        if logs.is_empty() {
            return None;
        }
        Some(ApplyLog {
            entries: logs.into_iter().flat_map(|l| l.entries.iter().cloned()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::result_set::Comparison;
    use crate::domain::models::verdict::Verdict;

    fn record(id: &str, verdict: Verdict) -> EvaluationRecord {
        EvaluationRecord {
            question_id: id.to_string(),
            generated_query: None,
            comparison: Comparison::failed("n/a"),
            verdicts: BTreeMap::from([(JudgeKind::Arbiter, verdict)]),
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_unknown_counts_as_failure_and_skipped_is_excluded() {
        let records = vec![
            record("a", Verdict::pass("ok")),
            record("b", Verdict::unknown("timeout")),
            record("c", Verdict::skipped("matched")),
            record("d", Verdict::skipped("matched")),
        ];
        let score = JudgeScore::tally(&records, JudgeKind::Arbiter);
        assert_eq!(score.passed, 1);
        assert_eq!(score.unknown, 1);
        assert_eq!(score.skipped, 2);
        assert!((score.pass_rate.unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_scored_verdicts_has_no_rate() {
        let records = vec![record("a", Verdict::skipped("matched"))];
        assert!(JudgeScore::tally(&records, JudgeKind::Arbiter).pass_rate.is_none());
    }
}

//! How stable the generator's answers are for the same question.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variance band of a question's repeated generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatabilityClass {
    Identical,
    MinorVariance,
    SignificantVariance,
    CriticalVariance,
}

impl RepeatabilityClass {
    /// Band for the share (in percent) of generations that agree with the
    /// most common query.
    pub fn classify(pct: f64) -> Self {
        if pct >= 100.0 {
            Self::Identical
        } else if pct >= 70.0 {
            Self::MinorVariance
        } else if pct >= 50.0 {
            Self::SignificantVariance
        } else {
            Self::CriticalVariance
        }
    }

    /// Whether the variance is large enough to count as a failure.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::SignificantVariance | Self::CriticalVariance)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identical => "identical",
            Self::MinorVariance => "minor_variance",
            Self::SignificantVariance => "significant_variance",
            Self::CriticalVariance => "critical_variance",
        }
    }
}

impl std::fmt::Display for RepeatabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repeated generations of one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatabilityCheck {
    pub question_id: String,
    /// Generations compared, the evaluated one included
    pub runs: usize,
    pub distinct_queries: usize,
    /// Share of generations matching the most common query, in percent
    pub pct: f64,
    pub class: RepeatabilityClass,
    /// Query fingerprint per generation, in generation order
    pub fingerprints: Vec<String>,
}

/// Within-iteration repeatability over every checked question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatabilityReport {
    pub average_pct: f64,
    /// Questions per class name
    pub classes: BTreeMap<String, usize>,
    pub checks: Vec<RepeatabilityCheck>,
}

impl RepeatabilityReport {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_checks(checks: Vec<RepeatabilityCheck>) -> Self {
        let mut classes = BTreeMap::new();
        for check in &checks {
            *classes.entry(check.class.as_str().to_string()).or_insert(0) += 1;
        }
        let average_pct = if checks.is_empty() {
            100.0
        } else {
            checks.iter().map(|c| c.pct).sum::<f64>() / checks.len() as f64
        };
        Self {
            average_pct,
            classes,
            checks,
        }
    }
}

/// Query stability between two consecutive iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossIterationReport {
    pub previous_iteration: usize,
    /// Questions with a generated query in both iterations
    pub compared: usize,
    pub matched: usize,
    pub average_pct: f64,
    /// Questions whose query changed
    pub changed: Vec<String>,
    /// Changed questions that were correct in the previous iteration
    pub unstable: Vec<String>,
}

//! Judge verdicts and the structured failure feedback attached to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of failure causes a judge can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    WrongTable,
    WrongColumn,
    WrongJoin,
    MissingFilter,
    MissingTemporalFilter,
    WrongAggregation,
    WrongMeasure,
    MissingInstruction,
    AmbiguousQuestion,
    AssetRoutingError,
    ParameterError,
    MissingSynonym,
    DescriptionMismatch,
    Hallucination,
    /// The same question produced different queries across generations
    RepeatabilityIssue,
    Other,
}

impl FailureType {
    pub const ALL: [Self; 16] = [
        Self::WrongTable,
        Self::WrongColumn,
        Self::WrongJoin,
        Self::MissingFilter,
        Self::MissingTemporalFilter,
        Self::WrongAggregation,
        Self::WrongMeasure,
        Self::MissingInstruction,
        Self::AmbiguousQuestion,
        Self::AssetRoutingError,
        Self::ParameterError,
        Self::MissingSynonym,
        Self::DescriptionMismatch,
        Self::Hallucination,
        Self::RepeatabilityIssue,
        Self::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WrongTable => "wrong_table",
            Self::WrongColumn => "wrong_column",
            Self::WrongJoin => "wrong_join",
            Self::MissingFilter => "missing_filter",
            Self::MissingTemporalFilter => "missing_temporal_filter",
            Self::WrongAggregation => "wrong_aggregation",
            Self::WrongMeasure => "wrong_measure",
            Self::MissingInstruction => "missing_instruction",
            Self::AmbiguousQuestion => "ambiguous_question",
            Self::AssetRoutingError => "asset_routing_error",
            Self::ParameterError => "parameter_error",
            Self::MissingSynonym => "missing_synonym",
            Self::DescriptionMismatch => "description_mismatch",
            Self::Hallucination => "hallucination",
            Self::RepeatabilityIssue => "repeatability_issue",
            Self::Other => "other",
        }
    }

    /// Parse a failure type, accepting a few common aliases.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "tvf_parameter_error" => return Some(Self::ParameterError),
            "routing_error" | "wrong_asset" => return Some(Self::AssetRoutingError),
            "ambiguous" | "ambiguity" => return Some(Self::AmbiguousQuestion),
            "repeatability" | "nondeterminism" => return Some(Self::RepeatabilityIssue),
            _ => {}
        }
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Self::Info),
            "minor" => Some(Self::Minor),
            "major" => Some(Self::Major),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Actionable side information: the structured cause behind a failing or
/// unknown verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsiFeedback {
    pub failure_type: FailureType,
    pub severity: Severity,
    /// Judge confidence in the attribution, always within `0.0..=1.0`
    pub confidence: f64,
    /// Metadata object identifiers held responsible
    #[serde(default)]
    pub blame_set: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual_fix: Option<String>,
    #[serde(default)]
    pub ambiguity_detected: bool,
}

impl AsiFeedback {
    pub fn new(failure_type: FailureType, severity: Severity, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            failure_type,
            severity,
            confidence,
            blame_set: Vec::new(),
            wrong_clause: None,
            expected_value: None,
            actual_value: None,
            counterfactual_fix: None,
            ambiguity_detected: false,
        }
    }

    /// Feedback for a verdict the judge could not produce at all.
    pub fn unattributed() -> Self {
        Self::new(FailureType::Other, Severity::Info, 0.0)
    }

    #[must_use]
    pub fn with_blame<I, S>(mut self, blame: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blame_set = blame.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_wrong_clause(mut self, clause: impl Into<String>) -> Self {
        self.wrong_clause = Some(clause.into());
        self
    }

    #[must_use]
    pub fn with_values(mut self, expected: Option<String>, actual: Option<String>) -> Self {
        self.expected_value = expected;
        self.actual_value = actual;
        self
    }

    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.counterfactual_fix = Some(fix.into());
        self
    }

    #[must_use]
    pub const fn with_ambiguity(mut self, detected: bool) -> Self {
        self.ambiguity_detected = detected;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictValue {
    Yes,
    No,
    Skipped,
    Unknown,
}

impl VerdictValue {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

/// Arbiter adjudication between the candidate and the expected query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterOutcome {
    GenieCorrect,
    GroundTruthCorrect,
    BothCorrect,
    NeitherCorrect,
}

impl ArbiterOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GenieCorrect => "genie_correct",
            Self::GroundTruthCorrect => "ground_truth_correct",
            Self::BothCorrect => "both_correct",
            Self::NeitherCorrect => "neither_correct",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genie_correct" => Some(Self::GenieCorrect),
            "ground_truth_correct" => Some(Self::GroundTruthCorrect),
            "both_correct" => Some(Self::BothCorrect),
            "neither_correct" => Some(Self::NeitherCorrect),
            _ => None,
        }
    }

    /// Whether the candidate answer is acceptable.
    pub const fn candidate_acceptable(&self) -> bool {
        matches!(self, Self::GenieCorrect | Self::BothCorrect)
    }
}

/// One judge's decision about one question.
///
/// Use the constructors: they guarantee that every `no` and `unknown`
/// verdict carries [`AsiFeedback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub value: VerdictValue,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arbiter: Option<ArbiterOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asi: Option<AsiFeedback>,
}

impl Verdict {
    pub fn pass(rationale: impl Into<String>) -> Self {
        Self {
            value: VerdictValue::Yes,
            rationale: rationale.into(),
            arbiter: None,
            asi: None,
        }
    }

    pub fn fail(rationale: impl Into<String>, asi: AsiFeedback) -> Self {
        Self {
            value: VerdictValue::No,
            rationale: rationale.into(),
            arbiter: None,
            asi: Some(asi),
        }
    }

    pub fn skipped(rationale: impl Into<String>) -> Self {
        Self {
            value: VerdictValue::Skipped,
            rationale: rationale.into(),
            arbiter: None,
            asi: None,
        }
    }

    /// Verdict for a judge whose call failed after all retries.
    pub fn unknown(rationale: impl Into<String>) -> Self {
        Self {
            value: VerdictValue::Unknown,
            rationale: rationale.into(),
            arbiter: None,
            asi: Some(AsiFeedback::unattributed()),
        }
    }

    #[must_use]
    pub const fn with_arbiter(mut self, outcome: ArbiterOutcome) -> Self {
        self.arbiter = Some(outcome);
        self
    }

    pub fn is_pass(&self) -> bool {
        self.value == VerdictValue::Yes
    }

    pub fn is_failure(&self) -> bool {
        self.value == VerdictValue::No
    }
}

/// The fixed set of judges, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeKind {
    SyntaxValidity,
    SchemaAccuracy,
    LogicalAccuracy,
    SemanticEquivalence,
    Completeness,
    AssetRouting,
    ResultCorrectness,
    Arbiter,
    /// Scored by the repeatability stage, not by a panel judge
    Repeatability,
}

impl JudgeKind {
    /// Judges that score every prediction
    pub const PANEL: [Self; 8] = [
        Self::SyntaxValidity,
        Self::SchemaAccuracy,
        Self::LogicalAccuracy,
        Self::SemanticEquivalence,
        Self::Completeness,
        Self::AssetRouting,
        Self::ResultCorrectness,
        Self::Arbiter,
    ];

    pub const ALL: [Self; 9] = [
        Self::SyntaxValidity,
        Self::SchemaAccuracy,
        Self::LogicalAccuracy,
        Self::SemanticEquivalence,
        Self::Completeness,
        Self::AssetRouting,
        Self::ResultCorrectness,
        Self::Arbiter,
        Self::Repeatability,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxValidity => "syntax_validity",
            Self::SchemaAccuracy => "schema_accuracy",
            Self::LogicalAccuracy => "logical_accuracy",
            Self::SemanticEquivalence => "semantic_equivalence",
            Self::Completeness => "completeness",
            Self::AssetRouting => "asset_routing",
            Self::ResultCorrectness => "result_correctness",
            Self::Arbiter => "arbiter",
            Self::Repeatability => "repeatability",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for JudgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

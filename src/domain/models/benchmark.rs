use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority tier of a benchmark question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Critical,
    #[default]
    Normal,
    HeldOut,
}

impl PriorityTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Normal => "normal",
            Self::HeldOut => "held_out",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" | "p0" => Some(Self::Critical),
            "normal" => Some(Self::Normal),
            "held_out" | "held-out" => Some(Self::HeldOut),
            _ => None,
        }
    }
}

/// Where the current expected query of a question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    #[default]
    Authored,
    ArbiterCorrection,
}

const fn default_version() -> u32 {
    1
}

/// A benchmark question with its expected query.
///
/// Owned by the benchmark collaborator. Within a run it is read-only; the
/// arbiter correction path produces a new version through
/// [`BenchmarkQuestion::corrected`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkQuestion {
    pub id: String,
    pub question: String,
    pub expected_query: String,
    #[serde(default)]
    pub tier: PriorityTier,
    /// Metadata objects this question exercises
    #[serde(default)]
    pub tags: Vec<String>,
    /// Preferred metadata surface for this question shape, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_asset: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub source: QuestionSource,
}

impl BenchmarkQuestion {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        expected_query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            expected_query: expected_query.into(),
            tier: PriorityTier::Normal,
            tags: Vec::new(),
            expected_asset: None,
            version: default_version(),
            source: QuestionSource::Authored,
        }
    }

    #[must_use]
    pub const fn with_tier(mut self, tier: PriorityTier) -> Self {
        self.tier = tier;
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_expected_asset(mut self, asset: impl Into<String>) -> Self {
        self.expected_asset = Some(asset.into());
        self
    }

    /// New version of this question whose expected query is `new_query`.
    #[must_use]
    pub fn corrected(&self, new_query: impl Into<String>) -> Self {
        Self {
            expected_query: new_query.into(),
            version: self.version + 1,
            source: QuestionSource::ArbiterCorrection,
            ..self.clone()
        }
    }

    /// Whether the question exercises any of the given objects.
    pub fn touches_any(&self, objects: &[String]) -> bool {
        self.tags.iter().any(|t| objects.contains(t))
    }
}

/// Which benchmark questions a run covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Full,
    /// Questions exercising any of the patched objects
    Slice { patched: Vec<String> },
    Tier { tier: PriorityTier },
    HeldOut,
}

impl Scope {
    pub fn includes(&self, question: &BenchmarkQuestion) -> bool {
        match self {
            Self::Full => question.tier != PriorityTier::HeldOut,
            Self::Slice { patched } => {
                question.tier != PriorityTier::HeldOut && question.touches_any(patched)
            }
            Self::Tier { tier } => question.tier == *tier,
            Self::HeldOut => question.tier == PriorityTier::HeldOut,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Slice { patched } => write!(f, "slice[{}]", patched.join(",")),
            Self::Tier { tier } => write!(f, "{}", tier.as_str()),
            Self::HeldOut => write!(f, "held_out"),
        }
    }
}

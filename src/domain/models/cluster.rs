use serde::{Deserialize, Serialize};

use super::verdict::{FailureType, JudgeKind};

/// Where a cluster's attribution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEvidence {
    /// Structured feedback emitted by the judges
    Structured,
    /// Inferred from free-text rationale
    RationaleFallback,
}

/// A root cause shared by at least two failing questions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCluster {
    /// Sequential id, `C001` onwards, in size order
    pub id: String,
    pub root_cause: String,
    pub failure_type: FailureType,
    pub question_ids: Vec<String>,
    pub affected_judge: JudgeKind,
    pub confidence: f64,
    /// Blame entries ordered by how many members cite them
    pub blame_set: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_clause: Option<String>,
    #[serde(default)]
    pub counterfactual_fixes: Vec<String>,
    #[serde(default)]
    pub ambiguity_detected: bool,
    /// Competing surfaces named by routing failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub competing_surfaces: Vec<String>,
    pub evidence: ClusterEvidence,
}

impl FailureCluster {
    pub fn size(&self) -> usize {
        self.question_ids.len()
    }

    /// Key identifying the same recurring failure across runs.
    pub fn signature(&self) -> String {
        let mut blame: Vec<&str> = self.blame_set.iter().map(String::as_str).collect();
        blame.sort_unstable();
        format!("{}|{}", self.failure_type.as_str(), blame.join(","))
    }
}

/// Output of one clustering pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub clusters: Vec<FailureCluster>,
    /// Questions whose failure pattern occurred only once
    pub long_tail: Vec<String>,
    /// Unknown verdicts, which carry no usable attribution
    pub unattributed: usize,
    /// Failing verdicts clustered from rationale text instead of feedback
    pub rationale_fallbacks: usize,
}

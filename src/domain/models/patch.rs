//! Metadata edit proposals, patch sets and their validation results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::metadata::ObjectKind;

/// Editable metadata surfaces, most durable first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLever {
    /// Entity and column descriptions
    Descriptions,
    DerivedViews,
    ParameterizedQueries,
    /// Free-text routing instructions, size-capped
    RoutingInstructions,
}

impl ControlLever {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Descriptions => "descriptions",
            Self::DerivedViews => "derived_views",
            Self::ParameterizedQueries => "parameterized_queries",
            Self::RoutingInstructions => "routing_instructions",
        }
    }

    /// Lever that owns objects of the given kind.
    pub const fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Entity | ObjectKind::Column => Self::Descriptions,
            ObjectKind::View => Self::DerivedViews,
            ObjectKind::Function => Self::ParameterizedQueries,
            ObjectKind::Instructions => Self::RoutingInstructions,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of metadata edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchType {
    UpdateDescription,
    UpdateColumnDescription,
    AddSynonym,
    RemoveSynonym,
    UpdateViewDefinition,
    UpdateFunctionDefinition,
    AddInstruction,
    UpdateInstruction,
    RemoveInstruction,
    /// Positive half of a bilateral disambiguation
    AddRoutingHint,
    /// Negative half of a bilateral disambiguation
    AddExclusion,
    HideColumn,
    UnhideColumn,
}

impl PatchType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UpdateDescription => "update_description",
            Self::UpdateColumnDescription => "update_column_description",
            Self::AddSynonym => "add_synonym",
            Self::RemoveSynonym => "remove_synonym",
            Self::UpdateViewDefinition => "update_view_definition",
            Self::UpdateFunctionDefinition => "update_function_definition",
            Self::AddInstruction => "add_instruction",
            Self::UpdateInstruction => "update_instruction",
            Self::RemoveInstruction => "remove_instruction",
            Self::AddRoutingHint => "add_routing_hint",
            Self::AddExclusion => "add_exclusion",
            Self::HideColumn => "hide_column",
            Self::UnhideColumn => "unhide_column",
        }
    }

    /// Inherent risk of this kind of edit
    pub const fn risk(&self) -> RiskLevel {
        match self {
            Self::UpdateDescription
            | Self::UpdateColumnDescription
            | Self::AddSynonym
            | Self::RemoveSynonym
            | Self::AddInstruction
            | Self::AddRoutingHint
            | Self::AddExclusion
            | Self::HideColumn
            | Self::UnhideColumn => RiskLevel::Low,
            Self::UpdateViewDefinition | Self::UpdateInstruction | Self::RemoveInstruction => {
                RiskLevel::Medium
            }
            Self::UpdateFunctionDefinition => RiskLevel::High,
        }
    }

    /// Whether the edit removes existing metadata content
    pub const fn is_removal(&self) -> bool {
        matches!(
            self,
            Self::RemoveSynonym | Self::RemoveInstruction | Self::HideColumn
        )
    }

    /// Whether the edit is one half of a bilateral disambiguation pair
    pub const fn is_bilateral(&self) -> bool {
        matches!(self, Self::AddRoutingHint | Self::AddExclusion)
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single proposed metadata edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchProposal {
    pub id: String,
    pub cluster_id: String,
    pub target: String,
    pub target_kind: ObjectKind,
    pub patch_type: PatchType,
    pub lever: ControlLever,
    /// Value before the edit, absent when the object does not exist yet
    pub old_value: Option<String>,
    pub new_value: String,
    pub risk: RiskLevel,
    /// Distinct objects this proposal (with its pair) touches
    pub blast_radius: usize,
    pub questions_fixed: usize,
    pub net_impact: f64,
    /// Shared by both halves of a bilateral disambiguation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_id: Option<String>,
    #[serde(default)]
    pub compliance_tagged: bool,
    pub rationale: String,
}

/// Ordered proposals considered together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    pub proposals: Vec<PatchProposal>,
}

impl PatchSet {
    pub fn new(proposals: Vec<PatchProposal>) -> Self {
        Self { proposals }
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Overall risk: the highest member risk.
    pub fn risk(&self) -> RiskLevel {
        self.proposals
            .iter()
            .map(|p| p.risk)
            .max()
            .unwrap_or_default()
    }

    /// Distinct target objects, sorted.
    pub fn touched_objects(&self) -> Vec<String> {
        self.proposals
            .iter()
            .map(|p| p.target.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// What happens to a valid patch set of a given risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPolicy {
    AutoApply,
    /// Apply, then run the post-apply verification gate
    AutoApplyWithVerification,
    RequiresConfirmation,
}

impl ApplyPolicy {
    pub const fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => Self::AutoApply,
            RiskLevel::Medium => Self::AutoApplyWithVerification,
            RiskLevel::High => Self::RequiresConfirmation,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApply => "auto_apply",
            Self::AutoApplyWithVerification => "auto_apply_with_verification",
            Self::RequiresConfirmation => "requires_confirmation",
        }
    }
}

/// A pair of proposals that may not be applied together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub rule: String,
    pub first: String,
    pub second: String,
    pub target: String,
}

/// Outcome of validating a whole patch set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub conflicts: Vec<Conflict>,
    /// Non-conflict violations: blast radius, pairing, compliance
    pub issues: Vec<String>,
    pub touched_objects: Vec<String>,
    pub risk: RiskLevel,
    pub policy: ApplyPolicy,
}

/// Advice to change the data model instead of editing metadata again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralRecommendation {
    pub cluster_id: String,
    pub signature: String,
    pub pattern: String,
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lever_durability_order() {
        assert!(ControlLever::Descriptions < ControlLever::DerivedViews);
        assert!(ControlLever::DerivedViews < ControlLever::ParameterizedQueries);
        assert!(ControlLever::ParameterizedQueries < ControlLever::RoutingInstructions);
    }

    #[test]
    fn test_policy_follows_risk() {
        assert_eq!(ApplyPolicy::for_risk(RiskLevel::Low), ApplyPolicy::AutoApply);
        assert_eq!(
            ApplyPolicy::for_risk(RiskLevel::Medium),
            ApplyPolicy::AutoApplyWithVerification
        );
        assert_eq!(
            ApplyPolicy::for_risk(RiskLevel::High),
            ApplyPolicy::RequiresConfirmation
        );
    }

    #[test]
    fn test_empty_set_is_low_risk() {
        assert_eq!(PatchSet::default().risk(), RiskLevel::Low);
    }
}

//! Safety checks run over a whole patch set before anything is written.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::domain::models::{
    ApplyPolicy, Conflict, OptimizerConfig, PatchProposal, PatchSet, PatchType, RiskLevel,
    ValidationResult,
};

/// Patch types that may not be applied to the same object together
const EXCLUSIVE_TYPES: [(PatchType, PatchType, &str); 7] = [
    (PatchType::AddSynonym, PatchType::RemoveSynonym, "add_remove_synonym"),
    (PatchType::AddInstruction, PatchType::RemoveInstruction, "add_remove_instruction"),
    (PatchType::UpdateInstruction, PatchType::RemoveInstruction, "update_remove_instruction"),
    (PatchType::AddInstruction, PatchType::UpdateInstruction, "add_update_instruction"),
    (PatchType::HideColumn, PatchType::UnhideColumn, "hide_unhide_column"),
    (PatchType::AddRoutingHint, PatchType::AddExclusion, "hint_exclusion_same_surface"),
    (PatchType::UpdateColumnDescription, PatchType::HideColumn, "describe_hidden_column"),
];

const SAME_TARGET_RULE: &str = "same_target_different_value";

/// Conflict rule violated by two proposals, if any.
pub fn conflict_rule(a: &PatchProposal, b: &PatchProposal) -> Option<&'static str> {
    if !a.target.eq_ignore_ascii_case(&b.target) {
        return None;
    }
    let exclusive = EXCLUSIVE_TYPES.iter().find(|(x, y, _)| {
        (*x == a.patch_type && *y == b.patch_type) || (*x == b.patch_type && *y == a.patch_type)
    });
    if let Some((_, _, rule)) = exclusive {
        return Some(rule);
    }
    (a.new_value != b.new_value).then_some(SAME_TARGET_RULE)
}

/// A patch set that passed validation.
///
/// Only [`PatchValidator::approve`] constructs one, so holding a value proves
/// the set was validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPatchSet {
    set: PatchSet,
    result: ValidationResult,
}

impl ValidatedPatchSet {
    pub fn proposals(&self) -> &[PatchProposal] {
        &self.set.proposals
    }

    pub const fn risk(&self) -> RiskLevel {
        self.result.risk
    }

    pub const fn policy(&self) -> ApplyPolicy {
        self.result.policy
    }

    pub const fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn touched_objects(&self) -> &[String] {
        &self.result.touched_objects
    }
}

/// Checks conflict rules, blast radius, pairing and compliance
#[derive(Debug, Clone)]
pub struct PatchValidator {
    max_blast_radius: usize,
}

impl PatchValidator {
    pub const fn new(max_blast_radius: usize) -> Self {
        Self { max_blast_radius }
    }

    pub const fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.max_blast_radius)
    }

    /// Validate a whole patch set.
    pub fn validate(&self, set: &PatchSet) -> ValidationResult {
        let mut conflicts = Vec::new();
        for (i, first) in set.proposals.iter().enumerate() {
            for second in &set.proposals[i + 1..] {
                if let Some(rule) = conflict_rule(first, second) {
                    conflicts.push(Conflict {
                        rule: rule.to_string(),
                        first: first.id.clone(),
                        second: second.id.clone(),
                        target: first.target.clone(),
                    });
                }
            }
        }

        let touched_objects = set.touched_objects();
        let mut issues = Vec::new();
        if touched_objects.len() > self.max_blast_radius {
            issues.push(format!(
                "patch set touches {} objects, limit is {}",
                touched_objects.len(),
                self.max_blast_radius
            ));
        }
        issues.extend(pairing_issues(&set.proposals));
        for proposal in &set.proposals {
            if proposal.compliance_tagged && proposal.patch_type.is_removal() {
                issues.push(format!(
                    "{} would {} on compliance-tagged object {}",
                    proposal.id, proposal.patch_type, proposal.target
                ));
            }
        }

        let risk = set.risk();
        let valid = conflicts.is_empty() && issues.is_empty();
        if !valid {
            warn!(
                conflicts = conflicts.len(),
                issues = issues.len(),
                "Patch set failed validation"
            );
        }

        ValidationResult {
            valid,
            conflicts,
            issues,
            touched_objects,
            risk,
            policy: ApplyPolicy::for_risk(risk),
        }
    }

    /// Validate and, when valid, wrap the set for the applier.
    pub fn approve(&self, set: PatchSet) -> Result<ValidatedPatchSet, ValidationResult> {
        let result = self.validate(&set);
        if result.valid {
            Ok(ValidatedPatchSet { set, result })
        } else {
            Err(result)
        }
    }

    /// Greedily assemble the highest-impact conflict-free batch within the
    /// blast radius. `proposals` are taken in order; bilateral pairs are
    /// admitted together or not at all.
    pub fn select_batch(&self, proposals: &[PatchProposal]) -> PatchSet {
        let mut units: Vec<Vec<&PatchProposal>> = Vec::new();
        let mut pair_slots: BTreeMap<&str, usize> = BTreeMap::new();
        for proposal in proposals {
            match proposal.pair_id.as_deref() {
                Some(pair_id) => match pair_slots.get(pair_id) {
                    Some(&slot) => units[slot].push(proposal),
                    None => {
                        pair_slots.insert(pair_id, units.len());
                        units.push(vec![proposal]);
                    }
                },
                None => units.push(vec![proposal]),
            }
        }

        let mut selected: Vec<PatchProposal> = Vec::new();
        let mut touched: BTreeSet<String> = BTreeSet::new();
        for unit in units {
            if unit[0].pair_id.is_some() && !pairing_issues(&unit).is_empty() {
                debug!(proposal_id = %unit[0].id, "Skipping incomplete bilateral pair");
                continue;
            }
            let internal_conflict = unit
                .iter()
                .enumerate()
                .any(|(i, a)| unit[i + 1..].iter().any(|b| conflict_rule(a, b).is_some()));
            let external_conflict = unit
                .iter()
                .any(|a| selected.iter().any(|b| conflict_rule(a, b).is_some()));
            if internal_conflict || external_conflict {
                debug!(proposal_id = %unit[0].id, "Skipping conflicting proposal");
                continue;
            }

            let mut next = touched.clone();
            next.extend(unit.iter().map(|p| p.target.clone()));
            if next.len() > self.max_blast_radius {
                debug!(proposal_id = %unit[0].id, "Skipping proposal beyond blast radius");
                continue;
            }

            touched = next;
            selected.extend(unit.into_iter().cloned());
        }
        PatchSet::new(selected)
    }
}

/// Issues with bilateral pairs: each pair needs exactly one hint and one
/// exclusion, and bilateral edits need a pair.
fn pairing_issues<P: Borrow<PatchProposal>>(proposals: &[P]) -> Vec<String> {
    let mut issues = Vec::new();
    let mut pairs: BTreeMap<&str, Vec<PatchType>> = BTreeMap::new();
    for proposal in proposals {
        let proposal: &PatchProposal = proposal.borrow();
        match proposal.pair_id.as_deref() {
            Some(pair_id) => pairs.entry(pair_id).or_default().push(proposal.patch_type),
            None if proposal.patch_type.is_bilateral() => issues.push(format!(
                "{} is a {} without its counterpart",
                proposal.id, proposal.patch_type
            )),
            None => {}
        }
    }
    for (pair_id, mut types) in pairs {
        types.sort_by_key(|t| t.as_str());
        if types != [PatchType::AddExclusion, PatchType::AddRoutingHint] {
            issues.push(format!("bilateral pair {pair_id} is incomplete"));
        }
    }
    issues
}

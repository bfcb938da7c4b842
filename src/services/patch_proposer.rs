//! Turns failure clusters into metadata edit proposals.
//!
//! Each cluster is mapped to the most durable control lever that can address
//! its failure type and has an existing target object: descriptions, then
//! derived views, then parameterized queries, then routing instructions.
//! Routing ambiguity gets a bilateral pair: a hint on the preferred surface
//! and an exclusion on the competing one.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::domain::models::{
    ControlLever, FailureCluster, FailureType, MetadataObject, ObjectKind, OptimizerConfig,
    PatchProposal, PatchType, StructuralRecommendation,
};
use crate::domain::ports::ProposalHistory;

/// Identifier used when the catalog has no instructions object yet
pub const DEFAULT_INSTRUCTIONS_ID: &str = "instructions";

const GENERIC_FIX_PREFIXES: [&str; 5] = ["review", "check", "verify", "ensure", "investigate"];

/// Query shapes that metadata edits do not fix reliably
struct KnownLimitation {
    pattern: &'static str,
    matcher: Regex,
    recommendation: &'static str,
}

static KNOWN_LIMITATIONS: LazyLock<Vec<KnownLimitation>> = LazyLock::new(|| {
    [
        (
            "nested_conditional",
            r"(?is)\bcase\b.+\bcase\b|nested (?:case|conditional)",
            "Materialize the nested conditional logic as a column of a derived view",
        ),
        (
            "window_running_total",
            r"(?i)\bover\s*\(|running total|cumulative|window function",
            "Precompute the running total in a derived view instead of asking for window logic",
        ),
        (
            "ratio_of_aggregates",
            r"(?i)\b(?:sum|count|avg)\s*\([^)]*\)\s*/\s*(?:nullif\s*\(\s*)?(?:sum|count|avg)\s*\(|ratio of (?:aggregates|sums|counts)",
            "Define the ratio as a measure of a derived view",
        ),
    ]
    .into_iter()
    .map(|(pattern, regex, recommendation)| KnownLimitation {
        pattern,
        matcher: Regex::new(regex).expect("Invalid known-limitation regex"),
        recommendation,
    })
    .collect()
});

/// Inputs the proposer reads besides the clusters
#[derive(Debug, Clone, Copy)]
pub struct ProposalContext<'a> {
    /// Current live catalog
    pub catalog: &'a [MetadataObject],
    pub history: &'a ProposalHistory,
    /// Expected query text by question id
    pub queries: &'a BTreeMap<String, String>,
}

/// Output of one proposal pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proposals {
    /// Ordered by net impact, highest first
    pub proposals: Vec<PatchProposal>,
    pub recommendations: Vec<StructuralRecommendation>,
    /// Cluster signatures that received a proposal this pass
    pub signatures: Vec<String>,
}

/// Edit the proposer would make before ids and scores are assigned
struct Draft<'a> {
    target: &'a str,
    target_kind: ObjectKind,
    patch_type: PatchType,
    old_value: Option<&'a str>,
    new_value: String,
    compliance_tagged: bool,
}

/// Maps clusters to levers and synthesizes new values
#[derive(Debug, Clone)]
pub struct PatchProposer {
    instruction_char_limit: usize,
    recurrence_limit: u32,
}

impl PatchProposer {
    pub const fn new(instruction_char_limit: usize, recurrence_limit: u32) -> Self {
        Self {
            instruction_char_limit,
            recurrence_limit,
        }
    }

    pub const fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.instruction_char_limit, config.recurrence_limit)
    }

    /// Propose edits for `clusters`, sorted by descending net impact.
    pub fn propose(&self, clusters: &[FailureCluster], context: ProposalContext<'_>) -> Proposals {
        let mut output = Proposals::default();
        let mut scored: Vec<PatchProposal> = Vec::new();

        for cluster in clusters {
            let signature = cluster.signature();
            let streak = context.history.streak(&signature);
            if streak >= self.recurrence_limit {
                if let Some(limitation) = known_limitation(cluster, context.queries) {
                    info!(
                        cluster_id = %cluster.id,
                        pattern = limitation.pattern,
                        streak,
                        "Recurring failure matches a known limitation"
                    );
                    output.recommendations.push(StructuralRecommendation {
                        cluster_id: cluster.id.clone(),
                        signature,
                        pattern: limitation.pattern.to_string(),
                        recommendation: limitation.recommendation.to_string(),
                    });
                    continue;
                }
            }

            let drafts = match self.drafts_for(cluster, context.catalog) {
                Ok(drafts) => drafts,
                Err(recommendation) => {
                    output.recommendations.push(recommendation);
                    continue;
                }
            };
            if drafts.is_empty() {
                debug!(cluster_id = %cluster.id, "Guidance already present, nothing to propose");
                continue;
            }

            let pair_id = (drafts.len() > 1).then(|| format!("{}-pair", cluster.id));
            let blast_radius = drafts.len();
            let net_impact = net_impact(cluster.size(), blast_radius, context.catalog.len());
            for draft in drafts {
                let risk = draft.patch_type.risk();
                scored.push(PatchProposal {
                    id: String::new(),
                    cluster_id: cluster.id.clone(),
                    target: draft.target.to_string(),
                    target_kind: draft.target_kind,
                    lever: ControlLever::for_kind(draft.target_kind),
                    patch_type: draft.patch_type,
                    old_value: draft.old_value.map(str::to_string),
                    new_value: draft.new_value,
                    risk,
                    blast_radius,
                    questions_fixed: cluster.size(),
                    net_impact,
                    pair_id: pair_id.clone(),
                    compliance_tagged: draft.compliance_tagged,
                    rationale: format!("{}: {}", cluster.id, cluster.root_cause),
                });
            }
            output.signatures.push(signature);
        }

        scored.sort_by(|a, b| b.net_impact.total_cmp(&a.net_impact));
        for (index, proposal) in scored.iter_mut().enumerate() {
            proposal.id = format!("P{:03}", index + 1);
        }
        output.proposals = scored;
        output
    }

    fn drafts_for<'a>(
        &self,
        cluster: &FailureCluster,
        catalog: &'a [MetadataObject],
    ) -> Result<Vec<Draft<'a>>, StructuralRecommendation> {
        let blamed: Vec<&MetadataObject> = cluster
            .blame_set
            .iter()
            .filter_map(|id| lookup(catalog, id))
            .collect();
        let first_of = |kinds: &[ObjectKind]| blamed.iter().copied().find(|o| kinds.contains(&o.kind));
        let guidance = guidance(cluster);

        let single = |object: &'a MetadataObject, patch_type: PatchType| -> Vec<Draft<'a>> {
            let line = match patch_type {
                PatchType::AddSynonym => format!("Also known as: {guidance}"),
                PatchType::UpdateViewDefinition | PatchType::UpdateFunctionDefinition => {
                    format!("-- {guidance}")
                }
                _ => guidance.clone(),
            };
            append(object, &guidance, &line)
                .map(|new_value| vec![Draft::edit(object, patch_type, new_value)])
                .unwrap_or_default()
        };

        let description = first_of(&[ObjectKind::Column, ObjectKind::Entity]).map(|o| {
            let patch_type = if o.kind == ObjectKind::Column {
                PatchType::UpdateColumnDescription
            } else {
                PatchType::UpdateDescription
            };
            (o, patch_type)
        });

        let lever_edit = match cluster.failure_type {
            FailureType::WrongColumn
            | FailureType::WrongTable
            | FailureType::WrongJoin
            | FailureType::DescriptionMismatch
            | FailureType::Hallucination
            | FailureType::RepeatabilityIssue => description,
            FailureType::MissingSynonym => description.map(|(o, _)| (o, PatchType::AddSynonym)),
            FailureType::WrongAggregation | FailureType::WrongMeasure => first_of(&[ObjectKind::View])
                .map(|o| (o, PatchType::UpdateViewDefinition))
                .or(description),
            FailureType::ParameterError => first_of(&[ObjectKind::Function])
                .map(|o| (o, PatchType::UpdateFunctionDefinition))
                .or(description),
            FailureType::AssetRoutingError | FailureType::AmbiguousQuestion => {
                if let Some(pair) = bilateral(cluster, catalog, &blamed) {
                    return Ok(pair);
                }
                None
            }
            FailureType::MissingFilter
            | FailureType::MissingTemporalFilter
            | FailureType::MissingInstruction
            | FailureType::Other => None,
        };

        if let Some((object, patch_type)) = lever_edit {
            return Ok(single(object, patch_type));
        }
        self.instruction_draft(cluster, catalog, &guidance)
    }

    /// Last resort: append a routing instruction, within the size ceiling.
    fn instruction_draft<'a>(
        &self,
        cluster: &FailureCluster,
        catalog: &'a [MetadataObject],
        guidance: &str,
    ) -> Result<Vec<Draft<'a>>, StructuralRecommendation> {
        let existing = catalog.iter().find(|o| o.kind == ObjectKind::Instructions);
        let line = format!("- {guidance}");

        let new_value = match existing {
            Some(object) => match append(object, guidance, &line) {
                Some(value) => value,
                None => return Ok(Vec::new()),
            },
            None => line,
        };

        if new_value.chars().count() > self.instruction_char_limit {
            info!(
                cluster_id = %cluster.id,
                limit = self.instruction_char_limit,
                "Instruction edit exceeds the size ceiling"
            );
            return Err(StructuralRecommendation {
                cluster_id: cluster.id.clone(),
                signature: cluster.signature(),
                pattern: "instruction_limit".to_string(),
                recommendation: format!(
                    "Routing instructions would exceed {} characters; move this guidance into descriptions or a derived view: {guidance}",
                    self.instruction_char_limit
                ),
            });
        }

        Ok(vec![match existing {
            Some(object) => Draft::edit(object, PatchType::AddInstruction, new_value),
            None => Draft {
                target: DEFAULT_INSTRUCTIONS_ID,
                target_kind: ObjectKind::Instructions,
                patch_type: PatchType::AddInstruction,
                old_value: None,
                new_value,
                compliance_tagged: false,
            },
        }])
    }
}

impl<'a> Draft<'a> {
    fn edit(object: &'a MetadataObject, patch_type: PatchType, new_value: String) -> Self {
        Self {
            target: &object.id,
            target_kind: object.kind,
            patch_type,
            old_value: Some(&object.value),
            new_value,
            compliance_tagged: object.is_compliance_tagged(),
        }
    }
}

/// Hint on the preferred surface plus exclusion on the competing one, or
/// nothing when either side is missing from the catalog.
fn bilateral<'a>(
    cluster: &FailureCluster,
    catalog: &'a [MetadataObject],
    blamed: &[&'a MetadataObject],
) -> Option<Vec<Draft<'a>>> {
    let preferred = blamed.first().copied()?;
    let competing = cluster
        .competing_surfaces
        .iter()
        .filter_map(|id| lookup(catalog, id))
        .find(|o| o.id != preferred.id)?;

    let hint = format!(
        "Preferred over {} for questions like: {}",
        competing.id,
        guidance(cluster)
    );
    let exclusion = format!("Do not use for questions answered by {}", preferred.id);

    let hint_value = append(preferred, &hint, &hint)?;
    let exclusion_value = append(competing, &exclusion, &exclusion)?;
    Some(vec![
        Draft::edit(preferred, PatchType::AddRoutingHint, hint_value),
        Draft::edit(competing, PatchType::AddExclusion, exclusion_value),
    ])
}

fn lookup<'a>(catalog: &'a [MetadataObject], id: &str) -> Option<&'a MetadataObject> {
    catalog.iter().find(|o| o.id.eq_ignore_ascii_case(id))
}

/// Current value with `line` appended, or `None` when `guidance` is already there.
fn append(object: &MetadataObject, guidance: &str, line: &str) -> Option<String> {
    if object.value.contains(guidance) {
        return None;
    }
    let current = object.value.trim_end();
    Some(if current.is_empty() {
        line.to_string()
    } else {
        format!("{current}\n{line}")
    })
}

/// Most specific counterfactual fix, or a line synthesized from the cluster.
fn guidance(cluster: &FailureCluster) -> String {
    cluster
        .counterfactual_fixes
        .iter()
        .find(|fix| !is_generic(fix, &cluster.blame_set))
        .cloned()
        .unwrap_or_else(|| synthesized_guidance(cluster))
}

fn is_generic(fix: &str, blame_set: &[String]) -> bool {
    let lower = fix.trim().to_lowercase();
    GENERIC_FIX_PREFIXES.iter().any(|p| lower.starts_with(p))
        && !blame_set.iter().any(|b| lower.contains(b.as_str()))
}

fn synthesized_guidance(cluster: &FailureCluster) -> String {
    let subject = cluster
        .blame_set
        .first()
        .map_or_else(|| "the affected objects".to_string(), Clone::clone);
    let clause = cluster
        .wrong_clause
        .as_deref()
        .map(|c| format!(" in the {c} clause"))
        .unwrap_or_default();
    match cluster.failure_type {
        FailureType::WrongColumn => format!("Use {subject} for this measure{clause}."),
        FailureType::WrongTable => format!("Use {subject} as the source table{clause}."),
        FailureType::WrongJoin => format!("Join through the keys documented for {subject}."),
        FailureType::MissingFilter => format!("Apply the standard filter for {subject}{clause}."),
        FailureType::MissingTemporalFilter => {
            format!("Filter {subject} to the requested period relative to the current date.")
        }
        FailureType::WrongAggregation | FailureType::WrongMeasure => {
            format!("Aggregate {subject} with its documented measure{clause}.")
        }
        FailureType::ParameterError => format!("Pass parameters to {subject} in declared order."),
        FailureType::AssetRoutingError | FailureType::AmbiguousQuestion => {
            format!("Route these questions to {subject}.")
        }
        FailureType::MissingSynonym => format!("Business terms in these questions refer to {subject}."),
        FailureType::DescriptionMismatch | FailureType::Hallucination => {
            format!("{subject} contains only the documented fields.")
        }
        FailureType::RepeatabilityIssue => {
            format!("Answer questions about {subject} with one consistent query{clause}.")
        }
        FailureType::MissingInstruction | FailureType::Other => {
            format!("{}: {}", cluster.failure_type, cluster.root_cause)
        }
    }
}

/// `questions_fixed - 0.1 * (blast_radius / total_objects)`
#[allow(clippy::cast_precision_loss)]
pub fn net_impact(questions_fixed: usize, blast_radius: usize, total_objects: usize) -> f64 {
    questions_fixed as f64 - 0.1 * (blast_radius as f64 / total_objects.max(1) as f64)
}

fn known_limitation(
    cluster: &FailureCluster,
    queries: &BTreeMap<String, String>,
) -> Option<&'static KnownLimitation> {
    let mut text = cluster.counterfactual_fixes.join("\n");
    text.push('\n');
    text.push_str(&cluster.root_cause);
    for id in &cluster.question_ids {
        if let Some(query) = queries.get(id) {
            text.push('\n');
            text.push_str(query);
        }
    }
    KNOWN_LIMITATIONS.iter().find(|l| l.matcher.is_match(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ClusterEvidence;
    use crate::domain::models::JudgeKind;

    fn catalog() -> Vec<MetadataObject> {
        vec![
            MetadataObject::new("sales", ObjectKind::Entity, "Sales fact table"),
            MetadataObject::new("sales.revenue_column", ObjectKind::Column, "Revenue"),
            MetadataObject::new("mv_sales", ObjectKind::View, "SELECT region, SUM(revenue) FROM sales GROUP BY region"),
            MetadataObject::new("sales_raw", ObjectKind::Entity, "Raw sales events"),
            MetadataObject::new("instructions", ObjectKind::Instructions, "- Use fiscal calendar."),
        ]
    }

    fn cluster(id: &str, failure_type: FailureType, blame: &[&str], questions: usize) -> FailureCluster {
        FailureCluster {
            id: id.to_string(),
            root_cause: format!("{failure_type} on {}", blame.join(", ")),
            failure_type,
            question_ids: (0..questions).map(|i| format!("{id}-q{i}")).collect(),
            affected_judge: JudgeKind::SchemaAccuracy,
            confidence: 0.7,
            blame_set: blame.iter().map(|b| (*b).to_string()).collect(),
            wrong_clause: None,
            counterfactual_fixes: Vec::new(),
            ambiguity_detected: false,
            competing_surfaces: Vec::new(),
            evidence: ClusterEvidence::Structured,
        }
    }

    fn propose(clusters: &[FailureCluster], catalog: &[MetadataObject]) -> Proposals {
        propose_with(clusters, catalog, &ProposalHistory::default(), &BTreeMap::new())
    }

    fn propose_with(
        clusters: &[FailureCluster],
        catalog: &[MetadataObject],
        history: &ProposalHistory,
        queries: &BTreeMap<String, String>,
    ) -> Proposals {
        PatchProposer::from_config(&OptimizerConfig::default()).propose(
            clusters,
            ProposalContext {
                catalog,
                history,
                queries,
            },
        )
    }

    #[test]
    fn test_wrong_column_targets_column_description() {
        let mut wrong_column = cluster("C001", FailureType::WrongColumn, &["sales.revenue_column"], 2);
        wrong_column.counterfactual_fixes =
            vec!["Describe sales.revenue_column as net revenue in USD".to_string()];

        let output = propose(&[wrong_column], &catalog());
        assert_eq!(output.proposals.len(), 1);
        let proposal = &output.proposals[0];
        assert_eq!(proposal.id, "P001");
        assert_eq!(proposal.target, "sales.revenue_column");
        assert_eq!(proposal.patch_type, PatchType::UpdateColumnDescription);
        assert_eq!(proposal.lever, ControlLever::Descriptions);
        assert_eq!(proposal.old_value.as_deref(), Some("Revenue"));
        assert_eq!(
            proposal.new_value,
            "Revenue\nDescribe sales.revenue_column as net revenue in USD"
        );
        assert_eq!(proposal.blast_radius, 1);
        assert_eq!(output.signatures, vec!["wrong_column|sales.revenue_column"]);
    }

    #[test]
    fn test_wrong_aggregation_prefers_view() {
        let output = propose(
            &[cluster("C001", FailureType::WrongAggregation, &["sales", "mv_sales"], 2)],
            &catalog(),
        );
        assert_eq!(output.proposals[0].patch_type, PatchType::UpdateViewDefinition);
        assert_eq!(output.proposals[0].lever, ControlLever::DerivedViews);
        assert!(output.proposals[0].new_value.contains("\n-- "));
    }

    #[test]
    fn test_wrong_aggregation_without_view_falls_back_to_description() {
        let output = propose(&[cluster("C001", FailureType::WrongAggregation, &["sales"], 2)], &catalog());
        assert_eq!(output.proposals[0].patch_type, PatchType::UpdateDescription);
    }

    #[test]
    fn test_missing_target_falls_back_to_instruction() {
        let output = propose(&[cluster("C001", FailureType::WrongColumn, &["nowhere.col"], 2)], &catalog());
        let proposal = &output.proposals[0];
        assert_eq!(proposal.patch_type, PatchType::AddInstruction);
        assert_eq!(proposal.target, "instructions");
        assert!(proposal.new_value.starts_with("- Use fiscal calendar.\n- "));
    }

    #[test]
    fn test_repeatability_issue_documents_the_entity_or_falls_back_to_instruction() {
        let output = propose(&[cluster("C001", FailureType::RepeatabilityIssue, &["sales"], 2)], &catalog());
        let proposal = &output.proposals[0];
        assert_eq!(proposal.patch_type, PatchType::UpdateDescription);
        assert!(proposal.new_value.ends_with("Answer questions about sales with one consistent query."));

        let output = propose(&[cluster("C001", FailureType::RepeatabilityIssue, &["mv_sales"], 2)], &catalog());
        assert_eq!(output.proposals[0].patch_type, PatchType::AddInstruction);
    }

    #[test]
    fn test_routing_ambiguity_proposes_bilateral_pair() {
        let mut routing = cluster("C001", FailureType::AssetRoutingError, &["mv_sales"], 3);
        routing.competing_surfaces = vec!["sales_raw".to_string()];

        let output = propose(&[routing], &catalog());
        assert_eq!(output.proposals.len(), 2);
        let (hint, exclusion) = (&output.proposals[0], &output.proposals[1]);
        assert_eq!(hint.patch_type, PatchType::AddRoutingHint);
        assert_eq!(hint.target, "mv_sales");
        assert_eq!(exclusion.patch_type, PatchType::AddExclusion);
        assert_eq!(exclusion.target, "sales_raw");
        assert_eq!(hint.pair_id, exclusion.pair_id);
        assert!(hint.pair_id.is_some());
        assert_eq!(hint.blast_radius, 2);
    }

    #[test]
    fn test_routing_without_competing_surface_uses_instruction() {
        let output = propose(&[cluster("C001", FailureType::AssetRoutingError, &["mv_sales"], 2)], &catalog());
        assert_eq!(output.proposals.len(), 1);
        assert_eq!(output.proposals[0].patch_type, PatchType::AddInstruction);
        assert!(output.proposals[0].pair_id.is_none());
    }

    #[test]
    fn test_generic_fix_is_replaced_with_synthesized_guidance() {
        let mut generic = cluster("C001", FailureType::WrongColumn, &["sales.revenue_column"], 2);
        generic.counterfactual_fixes = vec!["Review the column usage".to_string()];
        let output = propose(&[generic], &catalog());
        assert!(!output.proposals[0].new_value.contains("Review"));
        assert!(output.proposals[0].new_value.contains("Use sales.revenue_column"));
    }

    #[test]
    fn test_guidance_already_present_yields_nothing() {
        let mut repeat = cluster("C001", FailureType::WrongColumn, &["sales.revenue_column"], 2);
        repeat.counterfactual_fixes = vec!["net revenue in USD".to_string()];
        let mut catalog = catalog();
        catalog[1].value = "Revenue\nnet revenue in USD".to_string();
        let output = propose(&[repeat], &catalog);
        assert!(output.proposals.is_empty());
        assert!(output.signatures.is_empty());
    }

    #[test]
    fn test_instruction_over_limit_becomes_recommendation() {
        let mut catalog = catalog();
        catalog[4].value = "x".repeat(3_990);
        let output = propose(&[cluster("C001", FailureType::MissingFilter, &[], 2)], &catalog);
        assert!(output.proposals.is_empty());
        assert_eq!(output.recommendations.len(), 1);
        assert_eq!(output.recommendations[0].pattern, "instruction_limit");
    }

    #[test]
    fn test_recurring_known_limitation_becomes_recommendation() {
        let recurring = cluster("C001", FailureType::WrongAggregation, &["sales"], 2);
        let mut history = ProposalHistory::default();
        history.advance([recurring.signature().as_str()]);
        history.advance([recurring.signature().as_str()]);
        let queries = BTreeMap::from([(
            "C001-q0".to_string(),
            "SELECT region, SUM(revenue) OVER (ORDER BY day) FROM sales".to_string(),
        )]);

        let output = propose_with(&[recurring.clone()], &catalog(), &history, &queries);
        assert!(output.proposals.is_empty());
        assert_eq!(output.recommendations[0].pattern, "window_running_total");

        let fresh = propose_with(&[recurring], &catalog(), &ProposalHistory::default(), &queries);
        assert_eq!(fresh.proposals.len(), 1);
    }

    #[test]
    fn test_sorted_by_net_impact() {
        let output = propose(
            &[
                cluster("C001", FailureType::WrongColumn, &["sales.revenue_column"], 2),
                cluster("C002", FailureType::WrongTable, &["sales_raw"], 4),
            ],
            &catalog(),
        );
        assert_eq!(output.proposals[0].cluster_id, "C002");
        assert_eq!(output.proposals[0].id, "P001");
        assert!(output.proposals[0].net_impact > output.proposals[1].net_impact);
    }

    #[test]
    fn test_net_impact_formula() {
        assert!((net_impact(3, 2, 10) - 2.98).abs() < 1e-9);
        assert!((net_impact(1, 1, 0) - 0.9).abs() < 1e-9);
    }
}

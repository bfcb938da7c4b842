//! Groups failing verdicts into root-cause clusters.
//!
//! Failures are grouped by failure type, then joined into connected
//! components wherever their blame sets overlap. Failures with nothing to
//! blame group by the judge that reported them. Only groups spanning at
//! least two distinct questions become clusters; the rest form the long tail.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::domain::models::{
    AsiFeedback, ClusterEvidence, ClusterReport, EvaluationRecord, FailureCluster, FailureType,
    JudgeKind, Severity, VerdictValue,
};

/// Distinct questions a group needs before it is reported as a cluster
pub const MIN_CLUSTER_SIZE: usize = 2;

const RATIONALE_KEYWORDS: [(&str, FailureType); 9] = [
    ("join", FailureType::WrongJoin),
    ("column", FailureType::WrongColumn),
    ("table", FailureType::WrongTable),
    ("date", FailureType::MissingTemporalFilter),
    ("filter", FailureType::MissingFilter),
    ("aggregat", FailureType::WrongAggregation),
    ("measure", FailureType::WrongMeasure),
    ("instruction", FailureType::MissingInstruction),
    ("ambigu", FailureType::AmbiguousQuestion),
];

/// One failing verdict with the attribution used for grouping
#[derive(Debug)]
struct Failure<'a> {
    question_id: &'a str,
    judge: JudgeKind,
    asi: AsiFeedback,
    evidence: ClusterEvidence,
}

/// Cluster the failing verdicts of `records`.
pub fn cluster(records: &[EvaluationRecord]) -> ClusterReport {
    let mut report = ClusterReport::default();
    let failures = collect_failures(records, &mut report);

    let mut by_type: BTreeMap<FailureType, Vec<Failure<'_>>> = BTreeMap::new();
    for failure in failures {
        by_type.entry(failure.asi.failure_type).or_default().push(failure);
    }

    let mut clusters = Vec::new();
    let mut long_tail = BTreeSet::new();
    for (failure_type, group) in by_type {
        for members in components(group) {
            let questions = distinct_questions(&members);
            if questions.len() < MIN_CLUSTER_SIZE {
                long_tail.extend(questions.into_iter().map(str::to_string));
                continue;
            }
            clusters.push(build_cluster(failure_type, &members, questions));
        }
    }

    clusters.sort_by(|a, b| {
        b.size()
            .cmp(&a.size())
            .then_with(|| a.failure_type.cmp(&b.failure_type))
            .then_with(|| a.signature().cmp(&b.signature()))
    });
    for (index, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = format!("C{:03}", index + 1);
    }

    debug!(
        clusters = clusters.len(),
        long_tail = long_tail.len(),
        unattributed = report.unattributed,
        "Clustered failures"
    );
    report.clusters = clusters;
    report.long_tail = long_tail.into_iter().collect();
    report
}

fn collect_failures<'a>(
    records: &'a [EvaluationRecord],
    report: &mut ClusterReport,
) -> Vec<Failure<'a>> {
    let mut failures = Vec::new();
    for record in records {
        for (&judge, verdict) in &record.verdicts {
            match verdict.value {
                VerdictValue::Unknown => report.unattributed += 1,
                VerdictValue::No => {
                    let (asi, evidence) = match &verdict.asi {
                        Some(asi) => (normalize_blame(asi.clone()), ClusterEvidence::Structured),
                        None => {
                            warn!(
                                question_id = %record.question_id,
                                judge = %judge,
                                "Failing verdict has no structured feedback, inferring cause from rationale"
                            );
                            report.rationale_fallbacks += 1;
                            (
                                AsiFeedback::new(
                                    infer_failure_type(&verdict.rationale),
                                    Severity::Major,
                                    0.3,
                                ),
                                ClusterEvidence::RationaleFallback,
                            )
                        }
                    };
                    failures.push(Failure {
                        question_id: &record.question_id,
                        judge,
                        asi,
                        evidence,
                    });
                }
                VerdictValue::Yes | VerdictValue::Skipped => {}
            }
        }
    }
    failures
}

fn normalize_blame(mut asi: AsiFeedback) -> AsiFeedback {
    let blame: BTreeSet<String> = asi
        .blame_set
        .iter()
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .collect();
    asi.blame_set = blame.into_iter().collect();
    asi
}

/// Failure type suggested by keywords in a free-text rationale.
pub fn infer_failure_type(rationale: &str) -> FailureType {
    let lower = rationale.to_lowercase();
    RATIONALE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map_or(FailureType::Other, |(_, failure_type)| *failure_type)
}

/// Split same-type failures into groups: connected components of blame
/// overlap, then one group per (judge, evidence) for unblamed failures.
fn components(group: Vec<Failure<'_>>) -> Vec<Vec<Failure<'_>>> {
    let (blamed, unblamed): (Vec<_>, Vec<_>) =
        group.into_iter().partition(|f| !f.asi.blame_set.is_empty());

    let mut parent: Vec<usize> = (0..blamed.len()).collect();
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (index, failure) in blamed.iter().enumerate() {
        for entry in &failure.asi.blame_set {
            match owner.get(entry.as_str()) {
                Some(&other) => union(&mut parent, index, other),
                None => {
                    owner.insert(entry.as_str(), index);
                }
            }
        }
    }

    let roots: Vec<usize> = (0..blamed.len()).map(|i| find(&mut parent, i)).collect();
    let mut by_root: BTreeMap<usize, Vec<Failure<'_>>> = BTreeMap::new();
    for (failure, root) in blamed.into_iter().zip(roots) {
        by_root.entry(root).or_default().push(failure);
    }

    let mut by_judge: BTreeMap<(JudgeKind, bool), Vec<Failure<'_>>> = BTreeMap::new();
    for failure in unblamed {
        let fallback = failure.evidence == ClusterEvidence::RationaleFallback;
        by_judge.entry((failure.judge, fallback)).or_default().push(failure);
    }

    by_root.into_values().chain(by_judge.into_values()).collect()
}

fn find(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (root_a, root_b) = (find(parent, a), find(parent, b));
    if root_a != root_b {
        parent[root_a.max(root_b)] = root_a.min(root_b);
    }
}

fn distinct_questions<'a>(members: &[Failure<'a>]) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    members
        .iter()
        .map(|f| f.question_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn build_cluster(
    failure_type: FailureType,
    members: &[Failure<'_>],
    questions: Vec<&str>,
) -> FailureCluster {
    let evidence = if members
        .iter()
        .all(|f| f.evidence == ClusterEvidence::RationaleFallback)
    {
        ClusterEvidence::RationaleFallback
    } else {
        ClusterEvidence::Structured
    };

    let mut confidence = (0.5 + 0.1 * questions.len() as f64).min(0.9);
    if evidence == ClusterEvidence::RationaleFallback {
        confidence /= 2.0;
    }

    let affected_judge = most_common(members.iter().map(|f| f.judge))
        .unwrap_or(JudgeKind::ResultCorrectness);
    let blame_set = ranked(members.iter().flat_map(|f| f.asi.blame_set.iter().cloned()));
    let wrong_clause = most_common(members.iter().filter_map(|f| f.asi.wrong_clause.clone()));

    let mut counterfactual_fixes = Vec::new();
    for fix in members.iter().filter_map(|f| f.asi.counterfactual_fix.as_deref()) {
        let fix = fix.trim();
        if !fix.is_empty() && !counterfactual_fixes.iter().any(|f: &String| f == fix) {
            counterfactual_fixes.push(fix.to_string());
        }
    }

    let routing = matches!(
        failure_type,
        FailureType::AssetRoutingError | FailureType::AmbiguousQuestion
    );
    let competing_surfaces = if routing {
        ranked(
            members
                .iter()
                .filter_map(|f| f.asi.actual_value.as_deref())
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty() && !blame_set.contains(v)),
        )
    } else {
        Vec::new()
    };

    let root_cause = if blame_set.is_empty() {
        format!("{failure_type} reported by {affected_judge}")
    } else {
        format!("{failure_type} on {}", blame_set.join(", "))
    };

    FailureCluster {
        id: String::new(),
        root_cause,
        failure_type,
        question_ids: questions.into_iter().map(str::to_string).collect(),
        affected_judge,
        confidence,
        blame_set,
        wrong_clause,
        counterfactual_fixes,
        ambiguity_detected: members.iter().any(|f| f.asi.ambiguity_detected),
        competing_surfaces,
        evidence,
    }
}

/// Most frequent item; ties go to the smallest.
fn most_common<T: Ord>(items: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for (item, count) in counts {
        if best.as_ref().is_none_or(|(_, c)| count > *c) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

/// Distinct items ordered by frequency, then name.
fn ranked(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.into_iter().map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Comparison, Verdict};

    fn record(id: &str, verdicts: Vec<(JudgeKind, Verdict)>) -> EvaluationRecord {
        EvaluationRecord {
            question_id: id.to_string(),
            generated_query: Some("SELECT 1".to_string()),
            comparison: Comparison::failed("n/a"),
            verdicts: verdicts.into_iter().collect(),
            errors: Vec::new(),
        }
    }

    fn failing(failure_type: FailureType, blame: &[&str]) -> Verdict {
        Verdict::fail(
            "wrong",
            AsiFeedback::new(failure_type, Severity::Major, 0.8)
                .with_blame(blame.iter().copied())
                .with_fix("Describe revenue_column as net revenue in USD"),
        )
    }

    #[test]
    fn test_shared_blame_forms_one_cluster() {
        let records = vec![
            record(
                "q1",
                vec![(
                    JudgeKind::SchemaAccuracy,
                    failing(FailureType::WrongColumn, &["sales.revenue_column"]),
                )],
            ),
            record(
                "q2",
                vec![(
                    JudgeKind::SchemaAccuracy,
                    failing(FailureType::WrongColumn, &["sales.revenue_column"]),
                )],
            ),
        ];

        let report = cluster(&records);
        assert_eq!(report.clusters.len(), 1);
        let cluster = &report.clusters[0];
        assert_eq!(cluster.id, "C001");
        assert_eq!(cluster.question_ids, vec!["q1", "q2"]);
        assert_eq!(cluster.blame_set, vec!["sales.revenue_column"]);
        assert_eq!(cluster.affected_judge, JudgeKind::SchemaAccuracy);
        assert!((cluster.confidence - 0.7).abs() < 1e-9);
        assert_eq!(cluster.counterfactual_fixes.len(), 1);
        assert!(report.long_tail.is_empty());
    }

    #[test]
    fn test_overlap_is_transitive() {
        let records = vec![
            record("q1", vec![(JudgeKind::LogicalAccuracy, failing(FailureType::WrongJoin, &["a", "b"]))]),
            record("q2", vec![(JudgeKind::LogicalAccuracy, failing(FailureType::WrongJoin, &["b", "c"]))]),
            record("q3", vec![(JudgeKind::LogicalAccuracy, failing(FailureType::WrongJoin, &["c"]))]),
        ];
        let report = cluster(&records);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size(), 3);
    }

    #[test]
    fn test_different_types_do_not_merge() {
        let records = vec![
            record("q1", vec![(JudgeKind::SchemaAccuracy, failing(FailureType::WrongColumn, &["x"]))]),
            record("q2", vec![(JudgeKind::SchemaAccuracy, failing(FailureType::WrongTable, &["x"]))]),
        ];
        let report = cluster(&records);
        assert!(report.clusters.is_empty());
        assert_eq!(report.long_tail, vec!["q1", "q2"]);
    }

    #[test]
    fn test_same_question_twice_is_not_a_cluster() {
        let records = vec![record(
            "q1",
            vec![
                (JudgeKind::SchemaAccuracy, failing(FailureType::WrongColumn, &["x"])),
                (JudgeKind::Completeness, failing(FailureType::WrongColumn, &["x"])),
            ],
        )];
        let report = cluster(&records);
        assert!(report.clusters.is_empty());
        assert_eq!(report.long_tail, vec!["q1"]);
    }

    #[test]
    fn test_unblamed_failures_group_by_judge() {
        let records = vec![
            record("q1", vec![(JudgeKind::Completeness, failing(FailureType::MissingFilter, &[]))]),
            record("q2", vec![(JudgeKind::Completeness, failing(FailureType::MissingFilter, &[]))]),
            record("q3", vec![(JudgeKind::LogicalAccuracy, failing(FailureType::MissingFilter, &[]))]),
        ];
        let report = cluster(&records);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].affected_judge, JudgeKind::Completeness);
        assert_eq!(report.long_tail, vec!["q3"]);
    }

    #[test]
    fn test_unknown_verdicts_are_unattributed() {
        let records = vec![
            record("q1", vec![(JudgeKind::SchemaAccuracy, Verdict::unknown("timeout"))]),
            record("q2", vec![(JudgeKind::SchemaAccuracy, Verdict::unknown("timeout"))]),
        ];
        let report = cluster(&records);
        assert!(report.clusters.is_empty());
        assert_eq!(report.unattributed, 2);
    }

    #[test]
    fn test_rationale_fallback_halves_confidence() {
        let bare = |rationale: &str| Verdict {
            value: VerdictValue::No,
            rationale: rationale.to_string(),
            arbiter: None,
            asi: None,
        };
        let records = vec![
            record("q1", vec![(JudgeKind::LogicalAccuracy, bare("the join key is wrong"))]),
            record("q2", vec![(JudgeKind::LogicalAccuracy, bare("joins on the wrong key"))]),
        ];
        let report = cluster(&records);
        assert_eq!(report.rationale_fallbacks, 2);
        let cluster = &report.clusters[0];
        assert_eq!(cluster.failure_type, FailureType::WrongJoin);
        assert_eq!(cluster.evidence, ClusterEvidence::RationaleFallback);
        assert!((cluster.confidence - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_clusters_ordered_by_size() {
        let mut records = Vec::new();
        for id in ["a1", "a2"] {
            records.push(record(id, vec![(JudgeKind::SchemaAccuracy, failing(FailureType::WrongTable, &["t"]))]));
        }
        for id in ["b1", "b2", "b3"] {
            records.push(record(id, vec![(JudgeKind::SchemaAccuracy, failing(FailureType::WrongColumn, &["c"]))]));
        }
        let report = cluster(&records);
        assert_eq!(report.clusters[0].failure_type, FailureType::WrongColumn);
        assert_eq!(report.clusters[0].id, "C001");
        assert_eq!(report.clusters[1].id, "C002");
    }

    #[test]
    fn test_routing_cluster_collects_competing_surfaces() {
        let routing = |actual: &str| {
            Verdict::fail(
                "wrong asset",
                AsiFeedback::new(FailureType::AssetRoutingError, Severity::Major, 0.9)
                    .with_blame(["mv_sales"])
                    .with_values(Some("mv_sales".to_string()), Some(actual.to_string())),
            )
        };
        let records = vec![
            record("q1", vec![(JudgeKind::AssetRouting, routing("sales_raw"))]),
            record("q2", vec![(JudgeKind::AssetRouting, routing("sales_raw"))]),
        ];
        let report = cluster(&records);
        assert_eq!(report.clusters[0].competing_surfaces, vec!["sales_raw"]);
    }

    #[test]
    fn test_infer_failure_type() {
        assert_eq!(infer_failure_type("Uses the wrong column"), FailureType::WrongColumn);
        assert_eq!(infer_failure_type("Missing a filter on region"), FailureType::MissingFilter);
        assert_eq!(infer_failure_type("looks off"), FailureType::Other);
    }
}

//! Repeatability scoring: how often the generator returns the same query for
//! the same question, within one iteration and across consecutive ones.
//!
//! Failing checks become `repeatability` verdicts carrying
//! `repeatability_issue` feedback, so they cluster and get repaired like any
//! other failure.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::models::{
    AsiFeedback, CrossIterationReport, EvaluationRecord, FailureType, JudgeKind,
    RepeatabilityCheck, RepeatabilityClass, Severity, Verdict,
};
use crate::services::query_text;

/// Length of the hex fingerprint kept per generation
const FINGERPRINT_LEN: usize = 16;

/// Case- and whitespace-insensitive fingerprint of a query. A failed
/// generation fingerprints as the empty query.
pub fn fingerprint(query: &str) -> String {
    let digest = Sha256::digest(query.trim().to_lowercase().as_bytes());
    digest
        .iter()
        .take(FINGERPRINT_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Classify the generations of one question, the evaluated one first.
#[allow(clippy::cast_precision_loss)]
pub fn assess(question_id: &str, generations: &[Option<String>]) -> RepeatabilityCheck {
    let fingerprints: Vec<String> = generations
        .iter()
        .map(|g| fingerprint(g.as_deref().unwrap_or("")))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for fp in &fingerprints {
        *counts.entry(fp.as_str()).or_insert(0) += 1;
    }
    let most_common = counts.values().copied().max().unwrap_or(0);
    let pct = if fingerprints.is_empty() {
        100.0
    } else {
        most_common as f64 / fingerprints.len() as f64 * 100.0
    };

    RepeatabilityCheck {
        question_id: question_id.to_string(),
        runs: fingerprints.len(),
        distinct_queries: counts.len(),
        pct,
        class: RepeatabilityClass::classify(pct),
        fingerprints,
    }
}

/// Verdict for a within-iteration check; `candidate` is the evaluated query.
pub fn verdict(check: &RepeatabilityCheck, candidate: Option<&str>) -> Verdict {
    let summary = format!(
        "{} distinct queries over {} generations ({:.0}% agree, {})",
        check.distinct_queries, check.runs, check.pct, check.class
    );
    if !check.class.is_failure() {
        return Verdict::pass(summary);
    }

    let severity = if check.class == RepeatabilityClass::CriticalVariance {
        Severity::Critical
    } else {
        Severity::Major
    };
    Verdict::fail(summary, feedback(severity, 1.0 - check.pct / 100.0, candidate))
}

fn feedback(severity: Severity, confidence: f64, candidate: Option<&str>) -> AsiFeedback {
    let blame = candidate.map(query_text::referenced_objects).unwrap_or_default();
    let mut asi = AsiFeedback::new(FailureType::RepeatabilityIssue, severity, confidence)
        .with_blame(blame.iter().cloned());
    if !blame.is_empty() {
        asi.counterfactual_fix = Some(format!(
            "Describe {} precisely enough that these questions resolve to one query",
            blame.join(", ")
        ));
    }
    asi
}

/// Attach a repeatability verdict to every checked record.
pub fn annotate(records: &mut [EvaluationRecord], checks: &[RepeatabilityCheck]) {
    for check in checks {
        let Some(record) = records.iter_mut().find(|r| r.question_id == check.question_id) else {
            continue;
        };
        let verdict = verdict(check, record.generated_query.as_deref());
        debug!(question_id = %check.question_id, class = %check.class, "Repeatability scored");
        record.verdicts.insert(JudgeKind::Repeatability, verdict);
    }
}

/// Compare each question's query with the previous iteration's. A question
/// whose query changed after it was answered correctly is unstable and gets
/// a failing repeatability verdict; other compared questions pass unless a
/// within-iteration check already scored them.
#[allow(clippy::cast_precision_loss)]
pub fn cross_iteration(
    previous_iteration: usize,
    previous: &[EvaluationRecord],
    current: &mut [EvaluationRecord],
) -> CrossIterationReport {
    let before: HashMap<&str, (&str, bool)> = previous
        .iter()
        .filter_map(|r| Some((r.question_id.as_str(), (r.generated_query.as_deref()?, r.is_correct()))))
        .collect();

    let mut report = CrossIterationReport {
        previous_iteration,
        compared: 0,
        matched: 0,
        average_pct: 100.0,
        changed: Vec::new(),
        unstable: Vec::new(),
    };

    for record in current.iter_mut() {
        let Some(&(old_query, was_correct)) = before.get(record.question_id.as_str()) else {
            continue;
        };
        let Some(new_query) = record.generated_query.as_deref() else {
            continue;
        };
        report.compared += 1;

        if fingerprint(old_query) == fingerprint(new_query) {
            report.matched += 1;
            record.verdicts.entry(JudgeKind::Repeatability).or_insert_with(|| {
                Verdict::pass(format!("query unchanged since iteration {previous_iteration}"))
            });
            continue;
        }

        report.changed.push(record.question_id.clone());
        if was_correct {
            report.unstable.push(record.question_id.clone());
            let verdict = Verdict::fail(
                format!("query changed since iteration {previous_iteration}, where it was correct"),
                feedback(Severity::Major, 0.5, Some(new_query)),
            );
            record.verdicts.insert(JudgeKind::Repeatability, verdict);
        } else {
            record.verdicts.entry(JudgeKind::Repeatability).or_insert_with(|| {
                Verdict::pass(format!(
                    "query changed since iteration {previous_iteration}, where it was incorrect"
                ))
            });
        }
    }

    if report.compared > 0 {
        report.average_pct = report.matched as f64 / report.compared as f64 * 100.0;
    }
    report
}

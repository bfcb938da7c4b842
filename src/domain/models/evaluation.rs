use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::result_set::Comparison;
use super::verdict::{JudgeKind, Verdict};

/// Everything a run learned about one benchmark question.
///
/// Built once by the evaluator after all judges have finished. Only the
/// repeatability stage adds to it, before the run persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question_id: String,
    /// Sanitized candidate query, absent when generation failed
    pub generated_query: Option<String>,
    pub comparison: Comparison,
    pub verdicts: BTreeMap<JudgeKind, Verdict>,
    /// Collaborator and judge errors observed while evaluating this question
    #[serde(default)]
    pub errors: Vec<String>,
}

impl EvaluationRecord {
    pub fn verdict(&self, judge: JudgeKind) -> Option<&Verdict> {
        self.verdicts.get(&judge)
    }

    /// Whether the question passed the result-correctness judge.
    pub fn is_correct(&self) -> bool {
        self.verdict(JudgeKind::ResultCorrectness)
            .is_some_and(Verdict::is_pass)
    }

    /// Failing verdicts, in judge order.
    pub fn failures(&self) -> impl Iterator<Item = (JudgeKind, &Verdict)> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_failure())
            .map(|(k, v)| (*k, v))
    }
}

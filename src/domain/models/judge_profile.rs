//! Versioned judge prompts, resolved once at the start of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::verdict::JudgeKind;

/// Name of the profile compiled into the binary
pub const BUILTIN_PROFILE: &str = "builtin";

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{"verdict": "yes" | "no", "rationale": "<one or two sentences>",
 "failure_type": "<wrong_table|wrong_column|wrong_join|missing_filter|missing_temporal_filter|wrong_aggregation|wrong_measure|missing_instruction|ambiguous_question|asset_routing_error|parameter_error|missing_synonym|description_mismatch|hallucination|other>",
 "severity": "critical|major|minor|info", "confidence": <0.0-1.0>,
 "blame_set": ["<metadata object ids>"], "wrong_clause": "<SELECT|FROM|JOIN|WHERE|GROUP BY|ORDER BY|...>",
 "expected_value": "<...>", "actual_value": "<...>", "counterfactual_fix": "<concrete metadata change>",
 "ambiguity_detected": true | false}
Failure fields are required when the verdict is "no"."#;

const SCHEMA_ACCURACY: &str = "You are a query reviewer. Decide whether the generated query references the correct tables, columns and functions for the question.\n\nQuestion: {question}\nExpected query:\n{expected_query}\nGenerated query:\n{generated_query}\n\n";

const LOGICAL_ACCURACY: &str = "You are a query reviewer. Decide whether the generated query applies the correct filters, aggregations, grouping and joins for the question.\n\nQuestion: {question}\nExpected query:\n{expected_query}\nGenerated query:\n{generated_query}\n\n";

const SEMANTIC_EQUIVALENCE: &str = "You are a query reviewer. Decide whether the two queries measure the same thing and answer the same business question, even if written differently.\n\nQuestion: {question}\nExpected query:\n{expected_query}\nGenerated query:\n{generated_query}\n\n";

const COMPLETENESS: &str = "You are a query reviewer. Decide whether the generated query returns every dimension and measure the question asks for, with nothing missing.\n\nQuestion: {question}\nExpected query:\n{expected_query}\nGenerated query:\n{generated_query}\n\n";

const ARBITER: &str = r#"You adjudicate a disagreement between a generated query and the benchmark's expected query. Their results differ.

Question: {question}
Expected query:
{expected_query}
Generated query:
{generated_query}
Result comparison: {comparison}

Respond with a single JSON object and nothing else:
{"verdict": "genie_correct" | "ground_truth_correct" | "both_correct" | "neither_correct",
 "rationale": "<one or two sentences>", "failure_type": "<failure type>",
 "severity": "critical|major|minor|info", "confidence": <0.0-1.0>, "blame_set": ["<metadata object ids>"],
 "wrong_clause": "<clause>", "counterfactual_fix": "<concrete metadata change>", "ambiguity_detected": true | false}"#;

/// Prompt templates for the reasoning judges.
///
/// Templates use `{question}`, `{expected_query}`, `{generated_query}` and
/// `{comparison}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeProfile {
    pub version: String,
    pub templates: BTreeMap<JudgeKind, String>,
}

impl JudgeProfile {
    /// Profile with the compiled-in templates.
    pub fn builtin() -> Self {
        let templates = [
            (JudgeKind::SchemaAccuracy, SCHEMA_ACCURACY),
            (JudgeKind::LogicalAccuracy, LOGICAL_ACCURACY),
            (JudgeKind::SemanticEquivalence, SEMANTIC_EQUIVALENCE),
            (JudgeKind::Completeness, COMPLETENESS),
        ]
        .into_iter()
        .map(|(kind, body)| (kind, format!("{body}{RESPONSE_FORMAT}")))
        .chain(std::iter::once((JudgeKind::Arbiter, ARBITER.to_string())))
        .collect();

        Self {
            version: BUILTIN_PROFILE.to_string(),
            templates,
        }
    }

    pub fn template(&self, judge: JudgeKind) -> Option<&str> {
        self.templates.get(&judge).map(String::as_str)
    }

    /// Fill a judge's template.
    pub fn render(
        &self,
        judge: JudgeKind,
        question: &str,
        expected_query: &str,
        generated_query: &str,
        comparison: &str,
    ) -> Option<String> {
        self.template(judge).map(|t| {
            t.replace("{question}", question)
                .replace("{expected_query}", expected_query)
                .replace("{generated_query}", generated_query)
                .replace("{comparison}", comparison)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_reasoning_judges() {
        let profile = JudgeProfile::builtin();
        for kind in [
            JudgeKind::SchemaAccuracy,
            JudgeKind::LogicalAccuracy,
            JudgeKind::SemanticEquivalence,
            JudgeKind::Completeness,
            JudgeKind::Arbiter,
        ] {
            assert!(profile.template(kind).is_some(), "missing {kind}");
        }
        assert!(profile.template(JudgeKind::SyntaxValidity).is_none());
    }

    #[test]
    fn test_render_fills_placeholders() {
        let prompt = JudgeProfile::builtin()
            .render(JudgeKind::Arbiter, "how many", "SELECT 1", "SELECT 2", "mismatch")
            .unwrap();
        assert!(prompt.contains("Question: how many"));
        assert!(prompt.contains("SELECT 2"));
        assert!(prompt.contains("Result comparison: mismatch"));
        assert!(!prompt.contains("{question}"));
    }
}

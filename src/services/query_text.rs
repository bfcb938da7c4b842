//! Lightweight inspection of query text: sanitizing generated queries,
//! finding referenced objects and spotting stale hard-coded dates.

use regex::Regex;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("Invalid fence regex"));

static REFERENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:from|join)\s+([`"\[]?[\w.]+[`"\]]?)"#).expect("Invalid object regex")
});

static TEMPORAL_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:this|last|previous|current|past)\s+(?:year|quarter|month|week)\b|\bytd\b|\byear[- ]to[- ]date\b|\btoday\b|\byesterday\b",
    )
    .expect("Invalid temporal phrase regex")
});

static DATE_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'\d{4}-\d{2}-\d{2}'").expect("Invalid date literal regex"));

/// Reduce generated text to a single executable statement: code fences and
/// `--` comment lines are stripped and only the first statement is kept.
pub fn sanitize(query: &str) -> String {
    let unfenced = FENCE
        .captures(query)
        .and_then(|c| c.get(1))
        .map_or(query, |m| m.as_str());

    let without_comments: Vec<&str> = unfenced
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect();
    let joined = without_comments.join("\n");

    first_statement(&joined).trim().to_string()
}

/// Text up to the first `;` outside a quoted literal.
fn first_statement(query: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, ch) in query.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, ';') => return &query[..i],
            _ => {}
        }
    }
    query
}

/// Objects named in `FROM` and `JOIN` clauses, lower-cased and de-quoted.
pub fn referenced_objects(query: &str) -> Vec<String> {
    let mut objects: Vec<String> = REFERENCED_OBJECT
        .captures_iter(query)
        .filter_map(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'))
                .to_lowercase()
        })
        .collect();
    objects.dedup();
    objects
}

/// Whether `object` is referenced, matching either the full identifier or
/// its last dotted segment.
pub fn references(query: &str, object: &str) -> bool {
    let object = object.to_lowercase();
    let short = object.rsplit('.').next().unwrap_or(&object).to_string();
    referenced_objects(query)
        .iter()
        .any(|o| *o == object || o.rsplit('.').next() == Some(short.as_str()))
}

/// Warning text when a relative-time question is answered by a query that
/// pins a literal date.
pub fn stale_temporal_warning(question: &str, expected_query: &str) -> Option<String> {
    let phrase = TEMPORAL_PHRASE.find(question)?;
    let literal = DATE_LITERAL.find(expected_query)?;
    Some(format!(
        "question uses relative time '{}' but expected query hard-codes {}",
        phrase.as_str(),
        literal.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_fences_comments_and_trailing_statements() {
        let raw = "```sql\n-- top regions\nSELECT region FROM sales;\nDROP TABLE sales;\n```";
        assert_eq!(sanitize(raw), "SELECT region FROM sales");
    }

    #[test]
    fn test_sanitize_keeps_semicolons_inside_literals() {
        assert_eq!(
            sanitize("SELECT * FROM t WHERE note = 'a;b';"),
            "SELECT * FROM t WHERE note = 'a;b'"
        );
    }

    #[test]
    fn test_referenced_objects() {
        let query = "SELECT * FROM `Sales.Orders` o JOIN customers c ON o.id = c.id";
        assert_eq!(referenced_objects(query), vec!["sales.orders", "customers"]);
        assert!(references(query, "sales.orders"));
        assert!(references(query, "orders"));
        assert!(!references(query, "returns"));
    }

    #[test]
    fn test_function_call_in_from_is_referenced() {
        let query = "SELECT * FROM get_revenue('2024-01-01')";
        assert_eq!(referenced_objects(query), vec!["get_revenue"]);
    }

    #[test]
    fn test_stale_temporal_warning() {
        assert!(stale_temporal_warning(
            "total revenue this year",
            "SELECT SUM(revenue) FROM sales WHERE date >= '2023-01-01'"
        )
        .is_some());
        assert!(stale_temporal_warning(
            "total revenue this year",
            "SELECT SUM(revenue) FROM sales WHERE YEAR(date) = YEAR(CURRENT_DATE())"
        )
        .is_none());
        assert!(stale_temporal_warning(
            "revenue in 2023",
            "SELECT SUM(revenue) FROM sales WHERE date >= '2023-01-01'"
        )
        .is_none());
    }
}

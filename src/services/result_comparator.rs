//! Deterministic normalization and comparison of tabular results.
//!
//! Two results are an `exact` match when they are equal after cell-level
//! normalization in their original row order, and a `hash` match when the
//! content hashes of their fully normalized forms agree (which tolerates row
//! order and integer/float representation). A `signature` match (same schema
//! and row count) is recorded but never counts as a match.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::domain::models::{Comparison, MatchType, ResultSet, ResultSignature, Value};

const ROUND_SCALE: f64 = 1_000_000.0;
/// Beyond this magnitude a scaled float no longer has sub-unit precision.
const ROUNDABLE_LIMIT: f64 = 1.0e15;
/// Floats below this magnitude convert to `i64` without overflow.
const INTEGRAL_LIMIT: f64 = 9.0e18;
const MAX_ERROR_LEN: usize = 200;

/// Round a float to 6 decimal places, folding `-0.0` and NaN payloads.
fn round6(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let scaled = x * ROUND_SCALE;
    let rounded = if scaled.is_finite() && scaled.abs() < ROUNDABLE_LIMIT {
        scaled.round() / ROUND_SCALE
    } else {
        x
    };
    rounded + 0.0
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Float(f) => Value::Float(round6(*f)),
        Value::Text(s) => Value::Text(s.trim().to_string()),
        Value::Timestamp(ts) => Value::Timestamp(ts.with_timezone(&Utc).fixed_offset()),
        other => other.clone(),
    }
}

/// Normalize names and cells and order columns by name, keeping row order.
pub fn normalize_cells(result: &ResultSet) -> ResultSet {
    let names: Vec<String> = result
        .columns
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|a, b| names[*a].cmp(&names[*b]));

    let columns = order.iter().map(|i| names[*i].clone()).collect();
    let rows = result
        .rows
        .iter()
        .map(|row| {
            order
                .iter()
                .map(|i| row.get(*i).map_or(Value::Null, normalize_value))
                .collect()
        })
        .collect();

    ResultSet { columns, rows }
}

/// Fully normalize a result: lower-cased sorted columns, rounded floats,
/// trimmed strings, UTC timestamps and rows sorted by all columns.
///
/// Idempotent.
pub fn normalize(result: &ResultSet) -> ResultSet {
    let mut normalized = normalize_cells(result);
    // Integral floats become integers so representation cannot change row order.
    for cell in normalized.rows.iter_mut().flatten() {
        if let Value::Float(f) = cell {
            if let Some(i) = as_integral(*f) {
                *cell = Value::Int(i);
            }
        }
    }
    normalized.rows.sort();
    normalized
}

#[allow(clippy::cast_possible_truncation)]
fn as_integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < INTEGRAL_LIMIT).then_some(f as i64)
}

fn canonical_value(value: &Value, out: &mut String) {
    // Numbers render the same whether they arrived as integers or floats.
    let _ = match value {
        Value::Null => write!(out, "null"),
        Value::Bool(b) => write!(out, "b:{b}"),
        Value::Int(i) => write!(out, "n:{i}"),
        Value::Float(f) => match as_integral(*f) {
            Some(i) => write!(out, "n:{i}"),
            None => write!(out, "n:{f}"),
        },
        Value::Timestamp(ts) => write!(out, "t:{}", ts.to_rfc3339()),
        Value::Text(s) => write!(out, "s:{s:?}"),
    };
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// SHA-256 over the canonical text of a normalized result.
fn content_hash(normalized: &ResultSet) -> String {
    let mut text = normalized.columns.join("\u{1f}");
    for row in &normalized.rows {
        text.push('\n');
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                text.push('\u{1f}');
            }
            canonical_value(cell, &mut text);
        }
    }
    hex(&Sha256::digest(text.as_bytes()))
}

/// Cheap structural fingerprint: schema hash, row count and numeric sums.
pub fn signature(result: &ResultSet) -> ResultSignature {
    let normalized = normalize_cells(result);

    let mut schema: Vec<String> = normalized
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let dtype = normalized
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .find(|v| !matches!(v, Value::Null))
                .map_or("null", Value::type_name);
            format!("{name}:{dtype}")
        })
        .collect();
    schema.sort();
    let mut schema_hash = hex(&Sha256::digest(schema.join(",").as_bytes()));
    schema_hash.truncate(8);

    let mut numeric_sums = BTreeMap::new();
    for (i, name) in normalized.columns.iter().enumerate() {
        let mut numbers = normalized
            .rows
            .iter()
            .filter_map(|row| row.get(i).and_then(Value::as_f64))
            .peekable();
        if numbers.peek().is_some() {
            numeric_sums.insert(name.clone(), round6(numbers.sum()));
        }
    }

    ResultSignature {
        schema_hash,
        row_count: normalized.rows.len(),
        numeric_sums,
    }
}

/// Compare the expected result with the candidate's. Symmetric in `match`.
pub fn compare(expected: &ResultSet, candidate: &ResultSet) -> Comparison {
    let gt_cells = normalize_cells(expected);
    let cand_cells = normalize_cells(candidate);

    let gt_hash = content_hash(&normalize(expected));
    let cand_hash = content_hash(&normalize(candidate));
    let gt_signature = signature(expected);
    let cand_signature = signature(candidate);

    let match_type = if gt_cells == cand_cells {
        MatchType::Exact
    } else if gt_hash == cand_hash {
        MatchType::Hash
    } else if gt_signature.schema_hash == cand_signature.schema_hash
        && gt_signature.row_count == cand_signature.row_count
    {
        MatchType::Signature
    } else {
        MatchType::Mismatch
    };

    Comparison {
        matched: match_type.is_match(),
        match_type,
        gt_rows: expected.row_count(),
        cand_rows: candidate.row_count(),
        gt_hash: Some(gt_hash),
        cand_hash: Some(cand_hash),
        gt_signature: Some(gt_signature),
        cand_signature: Some(cand_signature),
        error: None,
    }
}

/// Compare two execution outcomes; a failure on either side is an `error`.
pub fn compare_outcomes<E: std::fmt::Display>(
    expected: &Result<ResultSet, E>,
    candidate: &Result<ResultSet, E>,
) -> Comparison {
    match (expected, candidate) {
        (Ok(gt), Ok(cand)) => compare(gt, cand),
        (Err(e), _) => {
            let mut comparison = Comparison::failed(truncate(&format!("expected query failed: {e}")));
            if let Ok(cand) = candidate {
                comparison.cand_rows = cand.row_count();
            }
            comparison
        }
        (Ok(gt), Err(e)) => {
            let mut comparison =
                Comparison::failed(truncate(&format!("candidate query failed: {e}")));
            comparison.gt_rows = gt.row_count();
            comparison
        }
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_ERROR_LEN {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(MAX_ERROR_LEN - 3).collect();
        out.push_str("...");
        out
    }
}

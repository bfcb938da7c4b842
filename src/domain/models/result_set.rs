//! Tabular query results and the outcome of comparing two of them.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single cell value returned by the execution engine.
///
/// Deserialization is untagged: JSON `null`, booleans, integers and floats map
/// to their variants, strings that parse as RFC 3339 become timestamps and all
/// other strings stay text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<FixedOffset>),
    Text(String),
}

impl Value {
    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Timestamp(_) => 3,
            Self::Text(_) => 4,
        }
    }

    /// Numeric view of the value, if it is a number.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Type name used in schema fingerprints. Integers and floats share one
    /// name so representation differences do not change the schema hash.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Timestamp(_) => "timestamp",
            Self::Text(_) => "text",
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// A tabular result: ordered column names and rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Cheap structural fingerprint of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSignature {
    /// First 8 hex chars of the hash over sorted `column:type` pairs
    pub schema_hash: String,
    pub row_count: usize,
    /// Sum of each numeric column, rounded to 6 decimal places
    pub numeric_sums: BTreeMap<String, f64>,
}

/// How two results relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Hash,
    Signature,
    Mismatch,
    Error,
}

impl MatchType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Hash => "hash",
            Self::Signature => "signature",
            Self::Mismatch => "mismatch",
            Self::Error => "error",
        }
    }

    /// Only exact and content-hash equality count as a match.
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Exact | Self::Hash)
    }
}

/// Outcome of comparing the expected result with the candidate's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(rename = "match")]
    pub matched: bool,
    pub match_type: MatchType,
    pub gt_rows: usize,
    pub cand_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cand_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt_signature: Option<ResultSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cand_signature: Option<ResultSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Comparison {
    /// Comparison that could not be computed because a query failed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            matched: false,
            match_type: MatchType::Error,
            gt_rows: 0,
            cand_rows: 0,
            gt_hash: None,
            cand_hash: None,
            gt_signature: None,
            cand_signature: None,
            error: Some(error.into()),
        }
    }
}

//! Property tests for result normalization and comparison.

use proptest::prelude::*;
use tuneloop::domain::models::{MatchType, ResultSet, Value};
use tuneloop::services::result_comparator::{compare, normalize};

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..1_000_000).prop_map(Value::Int),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[ a-zA-Z0-9]{0,8}".prop_map(Value::Text),
    ]
}

/// Swap the numeric representation of integral cells where `flips` says so.
fn flip_numeric(result: &ResultSet, flips: &[bool]) -> ResultSet {
    let mut flipped = result.clone();
    for (cell, flip) in flipped.rows.iter_mut().flatten().zip(flips.iter().cycle()) {
        if !flip {
            continue;
        }
        *cell = match &*cell {
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Value::Float(*i as f64),
            other => other.clone(),
        };
    }
    flipped
}

#[test]
fn test_mixed_int_float_rows_match_by_hash() {
    let columns = vec!["n".to_string(), "label".to_string()];
    let gt = ResultSet::new(
        columns.clone(),
        vec![
            vec![Value::Int(3), Value::Text("b".into())],
            vec![Value::Float(3.0), Value::Text("a".into())],
        ],
    );
    let cand = ResultSet::new(
        columns,
        vec![
            vec![Value::Float(3.0), Value::Text("b".into())],
            vec![Value::Int(3), Value::Text("a".into())],
        ],
    );
    let comparison = compare(&gt, &cand);
    assert_eq!(comparison.match_type, MatchType::Hash);
    assert!(comparison.matched);
    assert_eq!(comparison.gt_hash, comparison.cand_hash);
}

fn result_strategy() -> impl Strategy<Value = ResultSet> {
    (1usize..4).prop_flat_map(|width| {
        let columns = prop::collection::vec("[A-Za-z_]{1,6}", width);
        let rows = prop::collection::vec(prop::collection::vec(value_strategy(), width), 0..6);
        (columns, rows).prop_map(|(columns, rows)| ResultSet::new(columns, rows))
    })
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(result in result_strategy()) {
        let once = normalize(&result);
        let twice = normalize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_compare_is_symmetric(a in result_strategy(), b in result_strategy()) {
        let forward = compare(&a, &b);
        let backward = compare(&b, &a);
        prop_assert_eq!(forward.matched, backward.matched);
        prop_assert_eq!(forward.match_type, backward.match_type);
    }

    #[test]
    fn prop_result_matches_itself(result in result_strategy()) {
        prop_assert!(compare(&result, &result).matched);
    }

    #[test]
    fn prop_row_order_does_not_break_match(result in result_strategy()) {
        let mut reversed = result.clone();
        reversed.rows.reverse();
        prop_assert!(compare(&result, &reversed).matched);
    }

    #[test]
    fn prop_numeric_representation_does_not_break_match(
        result in result_strategy(),
        flips in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let mut flipped = flip_numeric(&result, &flips);
        flipped.rows.reverse();
        prop_assert!(compare(&result, &flipped).matched);
    }
}

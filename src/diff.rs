//! Equivalence check between two result sets.
//!
//! Both inputs are normalized on copies (sorted by `Customer, Item`; polars
//! frames carry no positional index to reset), then compared structurally:
//! column names and order, dtypes, row count and every value. When the sets
//! differ, a key-level diff explains how.

use crate::error::Result;
use crate::model::{frame_to_rows, AggregatedRow, CUSTOMER, ITEM};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of comparing two result sets.
#[derive(Debug, Clone)]
pub struct Equivalence {
    pub equal: bool,
    pub diff: ResultDiff,
}

/// Key-level differences, empty when the sets are equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDiff {
    pub only_left: Vec<AggregatedRow>,
    pub only_right: Vec<AggregatedRow>,
    /// Same (customer, item) key, different age or quantity.
    pub mismatched: Vec<(AggregatedRow, AggregatedRow)>,
    pub duplicates_left: Vec<(i64, String)>,
    pub duplicates_right: Vec<(i64, String)>,
    /// Set when the two sets do not share the canonical layout; no row diff is attempted then.
    pub schema_mismatch: Option<String>,
}

impl ResultDiff {
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty()
            && self.only_right.is_empty()
            && self.mismatched.is_empty()
            && self.duplicates_left.is_empty()
            && self.duplicates_right.is_empty()
            && self.schema_mismatch.is_none()
    }
}

/// Sorted copy of a result set.
pub fn normalize(df: &DataFrame) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .sort([CUSTOMER, ITEM], SortMultipleOptions::default())
        .collect()?)
}

/// Compare two result sets after normalization.
pub fn compare(left: &DataFrame, right: &DataFrame) -> Result<Equivalence> {
    let left = normalize(left)?;
    let right = normalize(right)?;

    if structurally_equal(&left, &right) {
        return Ok(Equivalence {
            equal: true,
            diff: ResultDiff::default(),
        });
    }

    let same_layout = left.get_column_names() == right.get_column_names()
        && left.dtypes() == right.dtypes();
    let diff = if !same_layout {
        schema_diff(format!(
            "{} vs {}",
            describe_schema(&left),
            describe_schema(&right)
        ))
    } else {
        match (frame_to_rows(&left), frame_to_rows(&right)) {
            (Ok(left_rows), Ok(right_rows)) => row_diff(&left_rows, &right_rows),
            (Err(e), _) | (_, Err(e)) => schema_diff(e.to_string()),
        }
    };
    Ok(Equivalence { equal: false, diff })
}

/// Whether two result sets are equivalent.
pub fn equivalent(left: &DataFrame, right: &DataFrame) -> Result<bool> {
    Ok(compare(left, right)?.equal)
}

fn structurally_equal(left: &DataFrame, right: &DataFrame) -> bool {
    left.get_column_names() == right.get_column_names()
        && left.dtypes() == right.dtypes()
        && left.height() == right.height()
        && left.equals_missing(right)
}

fn schema_diff(reason: String) -> ResultDiff {
    ResultDiff {
        schema_mismatch: Some(reason),
        ..Default::default()
    }
}

fn describe_schema(df: &DataFrame) -> String {
    let columns: Vec<String> = df
        .get_columns()
        .iter()
        .map(|s| format!("{}: {}", s.name(), s.dtype()))
        .collect();
    format!("[{}]", columns.join(", "))
}

fn row_diff(left: &[AggregatedRow], right: &[AggregatedRow]) -> ResultDiff {
    let (left_by_key, duplicates_left) = index_rows(left);
    let (right_by_key, duplicates_right) = index_rows(right);

    let mut diff = ResultDiff {
        duplicates_left,
        duplicates_right,
        ..Default::default()
    };

    for (key, row) in &left_by_key {
        match right_by_key.get(key) {
            None => diff.only_left.push((*row).clone()),
            Some(other) if other != row => diff.mismatched.push(((*row).clone(), (*other).clone())),
            Some(_) => {}
        }
    }
    for (key, row) in &right_by_key {
        if !left_by_key.contains_key(key) {
            diff.only_right.push((*row).clone());
        }
    }
    diff
}

type RowIndex<'a> = BTreeMap<(i64, &'a str), &'a AggregatedRow>;

fn index_rows(rows: &[AggregatedRow]) -> (RowIndex<'_>, Vec<(i64, String)>) {
    let mut index = BTreeMap::new();
    let mut duplicates = BTreeSet::new();
    for row in rows {
        if index.insert(row.key(), row).is_some() {
            duplicates.insert((row.customer, row.item.clone()));
        }
    }
    (index, duplicates.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rows_to_frame;

    fn frame(rows: &[AggregatedRow]) -> DataFrame {
        rows_to_frame(rows).unwrap()
    }

    #[test]
    fn test_order_does_not_matter() {
        let a = frame(&[
            AggregatedRow::new(2, 23, "y", 1),
            AggregatedRow::new(1, 21, "x", 20),
        ]);
        let b = frame(&[
            AggregatedRow::new(1, 21, "x", 20),
            AggregatedRow::new(2, 23, "y", 1),
        ]);

        let outcome = compare(&a, &b).unwrap();
        assert!(outcome.equal);
        assert!(outcome.diff.is_empty());
    }

    #[test]
    fn test_inputs_are_not_mutated() {
        let a = frame(&[
            AggregatedRow::new(2, 23, "y", 1),
            AggregatedRow::new(1, 21, "x", 20),
        ]);
        let before = a.clone();

        compare(&a, &a).unwrap();
        assert!(a.equals(&before));
    }

    #[test]
    fn test_diff_reports_each_kind_of_difference() {
        let a = frame(&[
            AggregatedRow::new(1, 21, "x", 20),
            AggregatedRow::new(2, 23, "y", 1),
        ]);
        let b = frame(&[
            AggregatedRow::new(1, 21, "x", 19),
            AggregatedRow::new(3, 35, "z", 2),
        ]);

        let outcome = compare(&a, &b).unwrap();
        assert!(!outcome.equal);
        assert_eq!(outcome.diff.only_left, vec![AggregatedRow::new(2, 23, "y", 1)]);
        assert_eq!(outcome.diff.only_right, vec![AggregatedRow::new(3, 35, "z", 2)]);
        assert_eq!(outcome.diff.mismatched.len(), 1);
    }

    #[test]
    fn test_duplicate_keys_are_flagged() {
        let a = frame(&[
            AggregatedRow::new(1, 21, "x", 20),
            AggregatedRow::new(1, 21, "x", 20),
        ]);
        let b = frame(&[AggregatedRow::new(1, 21, "x", 20)]);

        let outcome = compare(&a, &b).unwrap();
        assert!(!outcome.equal);
        assert_eq!(outcome.diff.duplicates_left, vec![(1, "x".to_string())]);
    }

    #[test]
    fn test_column_order_is_significant() {
        let a = frame(&[AggregatedRow::new(1, 21, "x", 20)]);
        let b = a.select(["Age", "Customer", "Item", "Quantity"]).unwrap();

        let outcome = compare(&a, &b).unwrap();
        assert!(!outcome.equal);
        assert!(outcome.diff.schema_mismatch.is_some());
    }

    #[test]
    fn test_dtype_mismatch_is_unequal_not_an_error() {
        let a = frame(&[AggregatedRow::new(1, 25, "123", 4)]);
        let b = df! [
            "Customer" => [1i64],
            "Age" => [25i64],
            "Item" => [123i64],
            "Quantity" => [4i64],
        ]
        .unwrap();

        let outcome = compare(&a, &b).unwrap();
        assert!(!outcome.equal);
        assert!(outcome.diff.schema_mismatch.is_some());
        assert!(!equivalent(&b, &a).unwrap());
    }

    #[test]
    fn test_empty_sets_are_equivalent() {
        assert!(equivalent(&frame(&[]), &frame(&[])).unwrap());
    }
}

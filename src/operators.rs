//! DataFrame steps of the tabular path.
//!
//! Each step takes a frame by value, runs one lazy plan and collects, so a
//! failure names the step it happened in.

use crate::error::{AnalysisError, Result};
use crate::model::{AgeBand, AGE as OUT_AGE, CUSTOMER, ITEM, QUANTITY as OUT_QUANTITY};
use crate::source::{AGE, CUSTOMER_ID, ITEM_NAME, QUANTITY};
use polars::prelude::*;

fn step_failed(step: &str) -> impl Fn(PolarsError) -> AnalysisError + '_ {
    move |e| AnalysisError::Polars(format!("{} failed: {}", step, e))
}

/// Inner equi-join on a column both frames share.
pub fn inner_join(left: DataFrame, right: DataFrame, on: &str) -> Result<DataFrame> {
    left.lazy()
        .join(
            right.lazy(),
            [col(on)],
            [col(on)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
        .map_err(|e| AnalysisError::Polars(format!("join on {} failed: {}", on, e)))
}

/// Keep rows whose `age` lies in the band (inclusive). Null ages never qualify.
pub fn filter_age_band(df: DataFrame, band: &AgeBand) -> Result<DataFrame> {
    df.lazy()
        .filter(
            col(AGE)
                .gt_eq(lit(band.min))
                .and(col(AGE).lt_eq(lit(band.max))),
        )
        .collect()
        .map_err(step_failed("age filter"))
}

pub fn drop_null_quantity(df: DataFrame) -> Result<DataFrame> {
    df.lazy()
        .filter(col(QUANTITY).is_not_null())
        .collect()
        .map_err(step_failed("null quantity filter"))
}

/// Convert `quantity` to Int64, rejecting any value with a fractional part.
pub fn coerce_quantity(df: DataFrame) -> Result<DataFrame> {
    let quantity = df.column(QUANTITY)?;
    match quantity.dtype().clone() {
        DataType::Int64 => return Ok(df),
        DataType::Float64 => {
            if let Some(bad) = quantity.f64()?.into_iter().flatten().find(|q| q.fract() != 0.0) {
                return Err(AnalysisError::DataContract(format!(
                    "non-integer quantity {} in Orders",
                    bad
                )));
            }
        }
        other => {
            return Err(AnalysisError::DataContract(format!(
                "quantity has unsupported type {}",
                other
            )));
        }
    }

    df.lazy()
        .with_column(col(QUANTITY).strict_cast(DataType::Int64))
        .collect()
        .map_err(step_failed("quantity coercion"))
}

/// Sum quantity per (customer_id, age, item_name).
pub fn group_sum(df: DataFrame) -> Result<DataFrame> {
    df.lazy()
        .group_by([col(CUSTOMER_ID), col(AGE), col(ITEM_NAME)])
        .agg([col(QUANTITY).sum()])
        .collect()
        .map_err(step_failed("group"))
}

pub fn keep_positive(df: DataFrame) -> Result<DataFrame> {
    df.lazy()
        .filter(col(QUANTITY).gt(lit(0)))
        .collect()
        .map_err(step_failed("positive total filter"))
}

/// Select and rename into the canonical `Customer, Age, Item, Quantity` layout.
pub fn to_canonical(df: DataFrame) -> Result<DataFrame> {
    df.lazy()
        .select([
            col(CUSTOMER_ID).alias(CUSTOMER),
            col(AGE).alias(OUT_AGE),
            col(ITEM_NAME).alias(ITEM),
            col(QUANTITY).alias(OUT_QUANTITY),
        ])
        .collect()
        .map_err(step_failed("rename"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_join_drops_unmatched() {
        let sales = df! [
            "sales_id" => [100i64, 101, 102],
            "customer_id" => [1i64, 2, 9],
        ]
        .unwrap();
        let customers = df! [
            "customer_id" => [1i64, 2],
            "age" => [25i64, 40],
        ]
        .unwrap();

        let joined = inner_join(sales, customers, CUSTOMER_ID).unwrap();
        assert_eq!(joined.height(), 2);
        assert_eq!(joined.get_column_names(), vec!["sales_id", "customer_id", "age"]);
    }

    #[test]
    fn test_age_band_boundaries() {
        let df = df! [
            "customer_id" => [1i64, 2, 3, 4, 5],
            "age" => [Some(17i64), Some(18), Some(35), Some(36), None],
        ]
        .unwrap();

        let filtered = filter_age_band(df, &AgeBand::default()).unwrap();
        let ids: Vec<i64> = filtered
            .column(CUSTOMER_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_coerce_rejects_fractional_quantity() {
        let df = df! ["quantity" => [1.0f64, 2.5]].unwrap();
        let err = coerce_quantity(df).unwrap_err();

        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("2.5"));
    }

    #[test]
    fn test_coerce_casts_whole_floats() {
        let df = df! ["quantity" => [1.0f64, -3.0]].unwrap();
        let coerced = coerce_quantity(df).unwrap();

        let quantity = coerced.column(QUANTITY).unwrap();
        assert_eq!(quantity.dtype(), &DataType::Int64);
        assert_eq!(quantity.i64().unwrap().get(1), Some(-3));
    }

    #[test]
    fn test_group_sum_then_keep_positive() {
        let df = df! [
            "customer_id" => [1i64, 1, 1, 1],
            "age" => [20i64, 20, 20, 20],
            "item_name" => ["a", "a", "b", "b"],
            "quantity" => [2i64, 3, 4, -4],
        ]
        .unwrap();

        let totals = keep_positive(group_sum(df).unwrap()).unwrap();
        assert_eq!(totals.height(), 1);
        assert_eq!(totals.column(ITEM_NAME).unwrap().str().unwrap().get(0), Some("a"));
        assert_eq!(totals.column(QUANTITY).unwrap().i64().unwrap().get(0), Some(5));
    }
}

//! Result-set model shared by both computation paths.
//!
//! A result set travels as a polars `DataFrame` with the canonical columns
//! `Customer, Age, Item, Quantity`. `AggregatedRow` is the typed view of one
//! row, used where individual records are needed (display, read-back, diffs).

use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const CUSTOMER: &str = "Customer";
pub const AGE: &str = "Age";
pub const ITEM: &str = "Item";
pub const QUANTITY: &str = "Quantity";

/// Canonical output columns, in report order.
pub const OUTPUT_COLUMNS: [&str; 4] = [CUSTOMER, AGE, ITEM, QUANTITY];

/// Per-customer, per-item summed quantity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregatedRow {
    #[serde(rename = "Customer")]
    pub customer: i64,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
}

impl AggregatedRow {
    pub fn new(customer: i64, age: i64, item: impl Into<String>, quantity: i64) -> Self {
        Self {
            customer,
            age,
            item: item.into(),
            quantity,
        }
    }

    /// Grouping key: one row per (customer, item).
    pub fn key(&self) -> (i64, &str) {
        (self.customer, self.item.as_str())
    }
}

/// Inclusive age range of the customers that qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBand {
    pub min: i64,
    pub max: i64,
}

impl AgeBand {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, age: i64) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl Default for AgeBand {
    fn default() -> Self {
        Self::new(18, 35)
    }
}

/// Build a canonical result-set frame from typed rows.
pub fn rows_to_frame(rows: &[AggregatedRow]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(CUSTOMER, rows.iter().map(|r| r.customer).collect::<Vec<i64>>()),
        Series::new(AGE, rows.iter().map(|r| r.age).collect::<Vec<i64>>()),
        Series::new(ITEM, rows.iter().map(|r| r.item.as_str()).collect::<Vec<&str>>()),
        Series::new(QUANTITY, rows.iter().map(|r| r.quantity).collect::<Vec<i64>>()),
    ])?;
    Ok(df)
}

/// Read a canonical result-set frame back into typed rows.
///
/// Fails if a column is missing, has the wrong dtype, or holds a null.
pub fn frame_to_rows(df: &DataFrame) -> Result<Vec<AggregatedRow>> {
    let customers = df.column(CUSTOMER)?.i64()?;
    let ages = df.column(AGE)?.i64()?;
    let items = df.column(ITEM)?.str()?;
    let quantities = df.column(QUANTITY)?.i64()?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        match (
            customers.get(idx),
            ages.get(idx),
            items.get(idx),
            quantities.get(idx),
        ) {
            (Some(customer), Some(age), Some(item), Some(quantity)) => {
                rows.push(AggregatedRow::new(customer, age, item, quantity));
            }
            _ => {
                return Err(AnalysisError::DataContract(format!(
                    "null value in result row {}",
                    idx
                )));
            }
        }
    }
    Ok(rows)
}

//! Relational path: the whole aggregation as one SQL query.
//!
//! Join, filter, grouping and the post-aggregation filter are all pushed to
//! SQLite. Note the grouping key is `(Customer, Item)` only; `Age` is read
//! from the ungrouped column, which is sound because `customer_id` is the
//! key of `Customers`.

use crate::error::{AnalysisError, Result};
use crate::model::{rows_to_frame, AgeBand, AggregatedRow};
use crate::source::{typed, with_source};
use polars::prelude::DataFrame;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::info;

pub const AGGREGATION_QUERY: &str = r#"
SELECT
    T1.customer_id AS Customer,
    T2.age AS Age,
    T4.item_name AS Item,
    SUM(T3.quantity) AS Quantity
FROM Sales AS T1
JOIN Customers AS T2
    ON T1.customer_id = T2.customer_id
JOIN Orders AS T3
    ON T1.sales_id = T3.sales_id
JOIN Items AS T4
    ON T3.item_id = T4.item_id
WHERE
    T2.age BETWEEN ?1 AND ?2
    AND T3.quantity IS NOT NULL
GROUP BY
    Customer, Item
HAVING
    SUM(T3.quantity) > 0
"#;

/// Run the relational path against the source at `db_path`.
pub fn run_relational(db_path: impl AsRef<Path>, band: &AgeBand) -> Result<DataFrame> {
    let rows = with_source(db_path, |conn| query_aggregates(conn, band))?;
    info!("SQL query executed - {} records found", rows.len());
    rows_to_frame(&rows)
}

/// Execute the aggregation query on an open connection.
pub fn query_aggregates(conn: &Connection, band: &AgeBand) -> Result<Vec<AggregatedRow>> {
    let mut stmt = conn.prepare(AGGREGATION_QUERY).map_err(|e| {
        AnalysisError::DataAccess(format!("failed to prepare aggregation query: {}", e))
    })?;
    let mut rows = stmt.query(params![band.min, band.max])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(AggregatedRow {
            customer: typed(row, 0, "aggregate")?,
            age: typed(row, 1, "aggregate")?,
            item: typed(row, 2, "aggregate")?,
            quantity: summed_quantity(row)?,
        });
    }
    Ok(out)
}

/// `SUM` over a REAL or mixed column comes back as REAL; whole numbers are accepted.
fn summed_quantity(row: &Row<'_>) -> Result<i64> {
    match row.get_ref(3)? {
        ValueRef::Integer(q) => Ok(q),
        ValueRef::Real(q) if q.fract() == 0.0 => Ok(q as i64),
        ValueRef::Real(q) => Err(AnalysisError::DataContract(format!(
            "non-integer summed quantity {}",
            q
        ))),
        other => Err(AnalysisError::DataContract(format!(
            "summed quantity holds a {} value",
            other.data_type()
        ))),
    }
}

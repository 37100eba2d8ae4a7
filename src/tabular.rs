//! Tabular path: load the four tables, then aggregate in memory.
//!
//! The connection is only held while loading; every step after that works
//! on owned DataFrames. Unlike the relational path, `age` is part of the
//! grouping key, which is only equivalent while `customer_id` stays unique
//! in `Customers`. `check_integrity` enforces that, and the other key and
//! reference invariants, before aggregating.

use crate::error::{AnalysisError, Result};
use crate::model::AgeBand;
use crate::operators;
use crate::source::{
    with_source, SourceTables, CUSTOMERS, CUSTOMER_ID, ITEMS, ITEM_ID, ORDERS, SALES, SALES_ID,
};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Run the tabular path against the source at `db_path`.
pub fn run_tabular(db_path: impl AsRef<Path>, band: &AgeBand) -> Result<DataFrame> {
    let tables = with_source(db_path, SourceTables::load)?;
    let result = aggregate_tables(tables, band)?;
    info!("Data processed with DataFrames - {} records found", result.height());
    Ok(result)
}

/// Aggregate already-loaded tables.
pub fn aggregate_tables(tables: SourceTables, band: &AgeBand) -> Result<DataFrame> {
    check_integrity(&tables)?;
    let SourceTables {
        customers,
        sales,
        orders,
        items,
    } = tables;

    let df = operators::inner_join(sales, customers, CUSTOMER_ID)?;
    let df = operators::filter_age_band(df, band)?;
    debug!("{} sales by customers in band", df.height());

    let df = operators::inner_join(df, orders, SALES_ID)?;
    let df = operators::inner_join(df, items, ITEM_ID)?;
    let df = operators::drop_null_quantity(df)?;
    debug!("{} qualifying order rows", df.height());

    let df = operators::coerce_quantity(df)?;
    let df = operators::group_sum(df)?;
    let df = operators::keep_positive(df)?;
    operators::to_canonical(df)
}

/// Check key uniqueness and referential integrity of the loaded tables.
pub fn check_integrity(tables: &SourceTables) -> Result<()> {
    ensure_unique(&tables.customers, CUSTOMERS, CUSTOMER_ID)?;
    ensure_unique(&tables.sales, SALES, SALES_ID)?;
    ensure_unique(&tables.items, ITEMS, ITEM_ID)?;

    ensure_references(&tables.sales, SALES, CUSTOMER_ID, &tables.customers, CUSTOMERS)?;
    ensure_references(&tables.orders, ORDERS, SALES_ID, &tables.sales, SALES)?;
    ensure_references(&tables.orders, ORDERS, ITEM_ID, &tables.items, ITEMS)?;
    Ok(())
}

fn ensure_unique(df: &DataFrame, table: &str, key: &str) -> Result<()> {
    let distinct = df.column(key)?.n_unique()?;
    if distinct != df.height() {
        return Err(AnalysisError::DataContract(format!(
            "{}.{} is not unique ({} rows, {} distinct keys)",
            table,
            key,
            df.height(),
            distinct
        )));
    }
    Ok(())
}

fn ensure_references(
    child: &DataFrame,
    child_table: &str,
    key: &str,
    parent: &DataFrame,
    parent_table: &str,
) -> Result<()> {
    let known = key_set(parent, key)?;
    let orphan = child
        .column(key)?
        .i64()?
        .into_iter()
        .flatten()
        .find(|id| !known.contains(id));

    match orphan {
        Some(id) => Err(AnalysisError::DataContract(format!(
            "{}.{} = {} has no matching row in {}",
            child_table, key, id, parent_table
        ))),
        None => Ok(()),
    }
}

fn key_set(df: &DataFrame, key: &str) -> Result<HashSet<i64>> {
    Ok(df.column(key)?.i64()?.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{frame_to_rows, AggregatedRow};

    fn tables(orders: DataFrame) -> SourceTables {
        SourceTables {
            customers: df! [
                "customer_id" => [1i64, 2],
                "age" => [25i64, 40],
            ]
            .unwrap(),
            sales: df! [
                "sales_id" => [100i64, 101],
                "customer_id" => [1i64, 2],
            ]
            .unwrap(),
            orders,
            items: df! [
                "item_id" => [10i64, 20],
                "item_name" => ["Widget", "Gadget"],
            ]
            .unwrap(),
        }
    }

    #[test]
    fn test_widget_scenario() {
        let orders = df! [
            "sales_id" => [100i64, 100, 101],
            "item_id" => [10i64, 10, 20],
            "quantity" => [Some(3.0f64), Some(2.0), Some(5.0)],
        ]
        .unwrap();

        let result = aggregate_tables(tables(orders), &AgeBand::default()).unwrap();
        assert_eq!(
            frame_to_rows(&result).unwrap(),
            vec![AggregatedRow::new(1, 25, "Widget", 5)]
        );
    }

    #[test]
    fn test_null_only_pair_produces_no_row() {
        let orders = df! [
            "sales_id" => [100i64, 100],
            "item_id" => [10i64, 20],
            "quantity" => [Some(3.0f64), None],
        ]
        .unwrap();

        let result = aggregate_tables(tables(orders), &AgeBand::default()).unwrap();
        let rows = frame_to_rows(&result).unwrap();
        assert_eq!(rows, vec![AggregatedRow::new(1, 25, "Widget", 3)]);
    }

    #[test]
    fn test_orphan_item_is_contract_violation() {
        let orders = df! [
            "sales_id" => [100i64],
            "item_id" => [99i64],
            "quantity" => [Some(1.0f64)],
        ]
        .unwrap();

        let err = aggregate_tables(tables(orders), &AgeBand::default()).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("Orders.item_id = 99"));
    }

    #[test]
    fn test_duplicate_customer_is_contract_violation() {
        let orders = df! [
            "sales_id" => [100i64],
            "item_id" => [10i64],
            "quantity" => [Some(1.0f64)],
        ]
        .unwrap();
        let mut tables = tables(orders);
        tables.customers = df! [
            "customer_id" => [1i64, 1],
            "age" => [25i64, 26],
        ]
        .unwrap();

        let err = check_integrity(&tables).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_duplicate_sale_is_contract_violation() {
        let orders = df! [
            "sales_id" => [100i64],
            "item_id" => [10i64],
            "quantity" => [Some(5.0f64)],
        ]
        .unwrap();
        let mut tables = tables(orders);
        tables.sales = df! [
            "sales_id" => [100i64, 100],
            "customer_id" => [1i64, 2],
        ]
        .unwrap();

        let err = aggregate_tables(tables, &AgeBand::default()).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(err.to_string().contains("Sales.sales_id"));
    }

    #[test]
    fn test_fractional_quantity_fails_the_path() {
        let orders = df! [
            "sales_id" => [100i64],
            "item_id" => [10i64],
            "quantity" => [Some(1.5f64)],
        ]
        .unwrap();

        let err = aggregate_tables(tables(orders), &AgeBand::default()).unwrap_err();
        assert!(err.is_contract_violation());
    }
}

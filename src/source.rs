//! Relational data source access.
//!
//! The source is a SQLite file holding `Customers`, `Sales`, `Orders` and
//! `Items`. Connections are opened read-only and scoped: `with_source` hands
//! a connection to a closure and releases it when the closure returns, on
//! success and on error alike.

use crate::error::{AnalysisError, Result};
use crate::seed;
use polars::prelude::*;
use rusqlite::types::{FromSql, ValueRef};
use rusqlite::{Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CUSTOMERS: &str = "Customers";
pub const SALES: &str = "Sales";
pub const ORDERS: &str = "Orders";
pub const ITEMS: &str = "Items";

pub const SOURCE_TABLES: [&str; 4] = [CUSTOMERS, SALES, ORDERS, ITEMS];

pub const CUSTOMER_ID: &str = "customer_id";
pub const AGE: &str = "age";
pub const SALES_ID: &str = "sales_id";
pub const ITEM_ID: &str = "item_id";
pub const QUANTITY: &str = "quantity";
pub const ITEM_NAME: &str = "item_name";

/// Read-only connection that logs its release.
pub struct SourceConnection {
    path: PathBuf,
    conn: Connection,
}

impl SourceConnection {
    /// Open an existing source. A missing file is a data access error, never an implicit create.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(AnalysisError::DataAccess(format!(
                "data source not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                AnalysisError::DataAccess(format!(
                    "failed to open {}: {}",
                    path.display(),
                    e
                ))
            })?;
        debug!("Connected to data source: {}", path.display());

        Ok(Self { path, conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for SourceConnection {
    fn drop(&mut self) {
        debug!("Data source connection closed: {}", self.path.display());
    }
}

/// Run `f` against a freshly opened connection that is released when `f` returns.
pub fn with_source<T, F>(path: impl AsRef<Path>, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let source = SourceConnection::open(path)?;
    f(source.conn())
}

/// Outcome of preparing the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Ready,
    Seeded,
}

/// Make sure the source exists with all four tables.
///
/// A missing file gets the sample dataset, once. An existing file with an
/// incomplete schema is left untouched and reported.
pub fn ensure_source(path: impl AsRef<Path>) -> Result<SourceStatus> {
    let path = path.as_ref();
    let status = if path.exists() {
        SourceStatus::Ready
    } else {
        warn!("Data source {} not found, creating sample data", path.display());
        seed::seed_sample_database(path)?;
        SourceStatus::Seeded
    };

    let missing = with_source(path, missing_tables)?;
    if !missing.is_empty() {
        return Err(AnalysisError::DataAccess(format!(
            "data source {} is missing tables: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    info!("Data source ready: {}", path.display());
    Ok(status)
}

fn missing_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let present = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SOURCE_TABLES
        .iter()
        .filter(|t| !present.iter().any(|p| p == *t))
        .map(|t| t.to_string())
        .collect())
}

/// The four source tables, fully loaded.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub customers: DataFrame,
    pub sales: DataFrame,
    pub orders: DataFrame,
    pub items: DataFrame,
}

impl SourceTables {
    pub fn load(conn: &Connection) -> Result<Self> {
        let tables = Self {
            customers: load_customers(conn)?,
            sales: load_sales(conn)?,
            orders: load_orders(conn)?,
            items: load_items(conn)?,
        };
        debug!(
            customers = tables.customers.height(),
            sales = tables.sales.height(),
            orders = tables.orders.height(),
            items = tables.items.height(),
            "Loaded source tables"
        );
        Ok(tables)
    }
}

fn load_customers(conn: &Connection) -> Result<DataFrame> {
    let mut stmt = conn.prepare("SELECT customer_id, age FROM Customers")?;
    let mut rows = stmt.query([])?;

    let mut ids = Vec::new();
    let mut ages = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(typed::<i64>(row, 0, CUSTOMERS)?);
        ages.push(typed::<Option<i64>>(row, 1, CUSTOMERS)?);
    }

    Ok(DataFrame::new(vec![
        Series::new(CUSTOMER_ID, ids),
        Series::new(AGE, ages),
    ])?)
}

fn load_sales(conn: &Connection) -> Result<DataFrame> {
    let mut stmt = conn.prepare("SELECT sales_id, customer_id FROM Sales")?;
    let mut rows = stmt.query([])?;

    let mut sales_ids = Vec::new();
    let mut customer_ids = Vec::new();
    while let Some(row) = rows.next()? {
        sales_ids.push(typed::<i64>(row, 0, SALES)?);
        customer_ids.push(typed::<i64>(row, 1, SALES)?);
    }

    Ok(DataFrame::new(vec![
        Series::new(SALES_ID, sales_ids),
        Series::new(CUSTOMER_ID, customer_ids),
    ])?)
}

/// Quantities load as floats so that fractional values survive until the
/// coercion step can reject them.
fn load_orders(conn: &Connection) -> Result<DataFrame> {
    let mut stmt = conn.prepare("SELECT sales_id, item_id, quantity FROM Orders")?;
    let mut rows = stmt.query([])?;

    let mut sales_ids = Vec::new();
    let mut item_ids = Vec::new();
    let mut quantities: Vec<Option<f64>> = Vec::new();
    while let Some(row) = rows.next()? {
        sales_ids.push(typed::<i64>(row, 0, ORDERS)?);
        item_ids.push(typed::<i64>(row, 1, ORDERS)?);
        let quantity = match row.get_ref(2)? {
            ValueRef::Null => None,
            ValueRef::Integer(q) => Some(q as f64),
            ValueRef::Real(q) => Some(q),
            other => {
                return Err(AnalysisError::DataContract(format!(
                    "{}.{} holds a {} value",
                    ORDERS,
                    QUANTITY,
                    other.data_type()
                )));
            }
        };
        quantities.push(quantity);
    }

    Ok(DataFrame::new(vec![
        Series::new(SALES_ID, sales_ids),
        Series::new(ITEM_ID, item_ids),
        Series::new(QUANTITY, quantities),
    ])?)
}

fn load_items(conn: &Connection) -> Result<DataFrame> {
    let mut stmt = conn.prepare("SELECT item_id, item_name FROM Items")?;
    let mut rows = stmt.query([])?;

    let mut ids = Vec::new();
    let mut names = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(typed::<i64>(row, 0, ITEMS)?);
        names.push(typed::<String>(row, 1, ITEMS)?);
    }

    Ok(DataFrame::new(vec![
        Series::new(ITEM_ID, ids),
        Series::new(ITEM_NAME, names),
    ])?)
}

/// Read one column value; a value of the wrong SQL type is a contract violation.
pub(crate) fn typed<T: FromSql>(row: &Row<'_>, idx: usize, table: &str) -> Result<T> {
    row.get::<_, T>(idx).map_err(|e| match e {
        rusqlite::Error::InvalidColumnType(_, name, ty) => {
            AnalysisError::DataContract(format!("{}.{} holds a {} value", table, name, ty))
        }
        rusqlite::Error::FromSqlConversionFailure(idx, ty, err) => AnalysisError::DataContract(
            format!("{} column {} ({}) failed conversion: {}", table, idx, ty, err),
        ),
        other => other.into(),
    })
}

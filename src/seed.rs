//! Sample dataset used when no data source exists yet.

use crate::error::{AnalysisError, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{info, warn};

const SCHEMA: &str = r#"
CREATE TABLE Customers (
    customer_id INTEGER PRIMARY KEY,
    age INTEGER
);
CREATE TABLE Items (
    item_id INTEGER PRIMARY KEY,
    item_name TEXT NOT NULL
);
CREATE TABLE Sales (
    sales_id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES Customers(customer_id)
);
CREATE TABLE Orders (
    sales_id INTEGER NOT NULL REFERENCES Sales(sales_id),
    item_id INTEGER NOT NULL REFERENCES Items(item_id),
    quantity INTEGER
);
"#;

// Ages 18 and 35 sit on the band edges, 17 and 36 just outside it.
const CUSTOMERS: [(i64, i64); 7] = [(1, 21), (2, 23), (3, 35), (4, 18), (5, 17), (6, 36), (7, 40)];

const ITEMS: [(i64, &str); 3] = [(1, "x"), (2, "y"), (3, "z")];

const SALES: [(i64, i64); 8] = [(1, 1), (2, 1), (3, 2), (4, 3), (5, 4), (6, 5), (7, 6), (8, 7)];

// (sales_id, item_id, quantity)
const ORDERS: [(i64, i64, Option<i64>); 15] = [
    (1, 1, Some(10)),
    (1, 3, None),
    (2, 1, Some(10)),
    (2, 3, None),
    (3, 1, Some(1)),
    (3, 2, Some(1)),
    (3, 3, Some(1)),
    (4, 3, Some(2)),
    (4, 2, Some(0)),
    (5, 2, Some(4)),
    (5, 2, Some(-4)),
    (5, 1, Some(7)),
    (6, 1, Some(5)),
    (7, 2, Some(3)),
    (8, 3, Some(9)),
];

/// Create a new SQLite file at `path` holding the four source tables and the sample rows.
///
/// Fails if the tables already exist. Schema and rows are written in one
/// transaction, and a file created by a failed attempt is removed again.
pub fn seed_sample_database(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let created = !path.exists();
    let seeded = Connection::open(path)
        .map_err(|e| {
            AnalysisError::DataAccess(format!("failed to create {}: {}", path.display(), e))
        })
        .and_then(write_sample);

    if let Err(e) = seeded {
        if created {
            if let Err(rm) = std::fs::remove_file(path) {
                warn!("Could not remove partial database {}: {}", path.display(), rm);
            }
        }
        return Err(e);
    }

    info!(
        customers = CUSTOMERS.len(),
        sales = SALES.len(),
        orders = ORDERS.len(),
        items = ITEMS.len(),
        "Created sample database {}",
        path.display()
    );
    Ok(())
}

fn write_sample(mut conn: Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    for (customer_id, age) in CUSTOMERS {
        tx.execute(
            "INSERT INTO Customers (customer_id, age) VALUES (?1, ?2)",
            params![customer_id, age],
        )?;
    }
    for (item_id, item_name) in ITEMS {
        tx.execute(
            "INSERT INTO Items (item_id, item_name) VALUES (?1, ?2)",
            params![item_id, item_name],
        )?;
    }
    for (sales_id, customer_id) in SALES {
        tx.execute(
            "INSERT INTO Sales (sales_id, customer_id) VALUES (?1, ?2)",
            params![sales_id, customer_id],
        )?;
    }
    for (sales_id, item_id, quantity) in ORDERS {
        tx.execute(
            "INSERT INTO Orders (sales_id, item_id, quantity) VALUES (?1, ?2, ?3)",
            params![sales_id, item_id, quantity],
        )?;
    }
    tx.commit()?;
    Ok(())
}

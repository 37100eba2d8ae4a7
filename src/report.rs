//! Report sink: `;`-delimited file with a `Customer;Age;Item;Quantity` header.

use crate::error::{AnalysisError, Result};
use crate::model::{AggregatedRow, AGE, CUSTOMER, ITEM, OUTPUT_COLUMNS, QUANTITY};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SEPARATOR: u8 = b';';

/// Write `df` to `path`.
///
/// Rows go to a sibling temp file that is renamed over `path` once complete,
/// so a failed write leaves any previous report as it was.
pub fn write_report(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = df.select(OUTPUT_COLUMNS).map_err(|e| {
        AnalysisError::Serialization(format!("result set lacks report columns: {}", e))
    })?;

    let tmp = temp_path(path);
    if let Err(e) = write_csv(&mut out, &tmp) {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            warn!("Could not remove {}: {}", tmp.display(), cleanup);
        }
        return Err(e);
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        AnalysisError::Serialization(format!("failed to move report into {}: {}", path.display(), e))
    })?;

    info!("Results saved to: {}", path.display());
    Ok(())
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        AnalysisError::Serialization(format!("failed to create {}: {}", path.display(), e))
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(SEPARATOR)
        .finish(df)
        .map_err(|e| {
            AnalysisError::Serialization(format!("failed to write {}: {}", path.display(), e))
        })?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load a written report back into a DataFrame with the canonical dtypes.
///
/// Columns are read as text and cast explicitly, so an item name that looks
/// like a number stays a string.
pub fn read_report(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    LazyCsvReader::new(path)
        .with_separator(SEPARATOR)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .map(|lf| {
            lf.select([
                col(CUSTOMER).strict_cast(DataType::Int64),
                col(AGE).strict_cast(DataType::Int64),
                col(ITEM).strict_cast(DataType::String),
                col(QUANTITY).strict_cast(DataType::Int64),
            ])
        })
        .and_then(|lf| lf.collect())
        .map_err(|e| AnalysisError::Serialization(format!("failed to read {}: {}", path.display(), e)))
}

/// Load a written report as typed rows.
pub fn read_report_rows(path: impl AsRef<Path>) -> Result<Vec<AggregatedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(SEPARATOR)
        .has_headers(true)
        .from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(OUTPUT_COLUMNS.iter().copied()) {
        return Err(AnalysisError::Serialization(format!(
            "unexpected report header: {}",
            headers.iter().collect::<Vec<_>>().join(";")
        )));
    }

    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<AggregatedRow>, csv::Error>>()?;
    Ok(rows)
}

/// Raw report contents, for echoing to the console.
pub fn echo_report(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map_err(|e| AnalysisError::Serialization(format!("could not read {}: {}", path.display(), e)))
}

/// Print a result set with its row count.
pub fn display_results(df: Option<&DataFrame>, method_name: &str) {
    match df {
        Some(df) if df.height() > 0 => {
            println!("{} Results:", method_name);
            println!("{}", df);
            println!("Total records: {}", df.height());
        }
        _ => println!("No results for {}", method_name),
    }
}

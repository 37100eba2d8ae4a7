use crate::model::AgeBand;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "db_file_sqlite.db";
pub const DEFAULT_OUTPUT_PATH: &str = "output.csv";

#[derive(Parser, Debug, Clone)]
#[command(name = "sales-xcheck")]
#[command(about = "Per-customer item totals for the 18-35 age band, computed twice and cross-checked")]
pub struct Args {
    /// Path to the SQLite data source (created with sample data if missing)
    #[arg(long, env = "SALES_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Path of the `;`-delimited report
    #[arg(short, long, env = "SALES_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Youngest qualifying age (inclusive)
    #[arg(long, env = "SALES_MIN_AGE", default_value_t = 18)]
    pub min_age: i64,

    /// Oldest qualifying age (inclusive)
    #[arg(long, env = "SALES_MAX_AGE", default_value_t = 35)]
    pub max_age: i64,
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisConfig {
    pub db_path: PathBuf,
    pub output_path: PathBuf,
    pub band: AgeBand,
}

impl AnalysisConfig {
    pub fn new(db_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            output_path: output_path.into(),
            band: AgeBand::default(),
        }
    }

    pub fn with_band(mut self, band: AgeBand) -> Self {
        self.band = band;
        self
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DB_PATH, DEFAULT_OUTPUT_PATH)
    }
}

impl From<Args> for AnalysisConfig {
    fn from(args: Args) -> Self {
        Self::new(args.db, args.output).with_band(AgeBand::new(args.min_age, args.max_age))
    }
}

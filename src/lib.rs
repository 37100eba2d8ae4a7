//! Retail sales cross-check.
//!
//! Computes the total quantity of each item bought by customers in an age
//! band twice, once as a single SQL query over a SQLite source and once as
//! explicit polars DataFrame steps, then checks that both agree and writes
//! a `;`-delimited report.

pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod operators;
pub mod pipeline;
pub mod report;
pub mod seed;
pub mod source;
pub mod sql_engine;
pub mod tabular;

pub use config::{AnalysisConfig, Args};
pub use error::{AnalysisError, Result};
pub use model::{AgeBand, AggregatedRow};
pub use pipeline::{run_pipeline, RunOutput, RunSummary};

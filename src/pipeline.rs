//! End-to-end run: `Start → SourceReady → PathARun → PathBRun → Compared → Saved → End`.
//!
//! Stages run in order and never abort the run. A failed path yields no
//! result set; a failed save yields no report. Every failure is recorded in
//! the returned summary.

use crate::config::AnalysisConfig;
use crate::diff::{self, Equivalence};
use crate::error::{AnalysisError, Result};
use crate::report;
use crate::source::{self, SourceStatus};
use crate::sql_engine;
use crate::tabular;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStage {
    Start,
    SourceReady,
    PathARun,
    PathBRun,
    Compared,
    Saved,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageError {
    pub stage: RunStage,
    pub message: String,
    pub contract_violation: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub seeded: bool,
    pub relational_rows: Option<usize>,
    pub tabular_rows: Option<usize>,
    pub equivalent: Option<bool>,
    pub report_path: Option<PathBuf>,
    pub errors: Vec<StageError>,
}

impl RunSummary {
    /// At least one path produced a result set.
    pub fn any_result(&self) -> bool {
        self.relational_rows.is_some() || self.tabular_rows.is_some()
    }

    pub fn contract_violations(&self) -> impl Iterator<Item = &StageError> {
        self.errors.iter().filter(|e| e.contract_violation)
    }

    fn record(&mut self, stage: RunStage, err: &AnalysisError) {
        if err.is_contract_violation() {
            error!(stage = ?stage, "{}", err);
        } else {
            warn!(stage = ?stage, "{}", err);
        }
        self.errors.push(StageError {
            stage,
            message: err.to_string(),
            contract_violation: err.is_contract_violation(),
        });
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub relational: Option<DataFrame>,
    pub tabular: Option<DataFrame>,
    pub equivalence: Option<Equivalence>,
}

fn enter(stage: RunStage) {
    debug!(stage = ?stage, "Entering stage");
}

pub fn run_pipeline(config: &AnalysisConfig) -> RunOutput {
    let mut summary = RunSummary::default();
    enter(RunStage::Start);

    enter(RunStage::SourceReady);
    match source::ensure_source(&config.db_path) {
        Ok(status) => summary.seeded = status == SourceStatus::Seeded,
        Err(e) => summary.record(RunStage::SourceReady, &e),
    }

    enter(RunStage::PathARun);
    info!("Running relational path (single SQL query)");
    let relational = run_path(&mut summary, RunStage::PathARun, || {
        sql_engine::run_relational(&config.db_path, &config.band)
    });
    summary.relational_rows = relational.as_ref().map(DataFrame::height);

    enter(RunStage::PathBRun);
    info!("Running tabular path (DataFrame joins and group-by)");
    let tabular = run_path(&mut summary, RunStage::PathBRun, || {
        tabular::run_tabular(&config.db_path, &config.band)
    });
    summary.tabular_rows = tabular.as_ref().map(DataFrame::height);

    enter(RunStage::Compared);
    let equivalence = match (&relational, &tabular) {
        (Some(a), Some(b)) => match diff::compare(a, b) {
            Ok(outcome) => {
                log_equivalence(&outcome);
                summary.equivalent = Some(outcome.equal);
                Some(outcome)
            }
            Err(e) => {
                summary.record(RunStage::Compared, &e);
                None
            }
        },
        _ => {
            info!("Validation skipped: a path produced no result");
            None
        }
    };

    enter(RunStage::Saved);
    if let Some(chosen) = relational.as_ref().or(tabular.as_ref()) {
        match save(chosen, config) {
            Ok(true) => summary.report_path = Some(config.output_path.clone()),
            Ok(false) => info!("No data to save"),
            Err(e) => summary.record(RunStage::Saved, &e),
        }
    } else {
        info!("No data to save");
    }

    enter(RunStage::End);
    if let Ok(json) = serde_json::to_string(&summary) {
        debug!("Run summary: {}", json);
    }

    RunOutput {
        summary,
        relational,
        tabular,
        equivalence,
    }
}

fn run_path<F>(summary: &mut RunSummary, stage: RunStage, f: F) -> Option<DataFrame>
where
    F: FnOnce() -> Result<DataFrame>,
{
    match f() {
        Ok(df) => Some(df),
        Err(e) => {
            summary.record(stage, &e);
            None
        }
    }
}

/// Write the normalized result set. `Ok(false)` when there is nothing to write.
fn save(df: &DataFrame, config: &AnalysisConfig) -> Result<bool> {
    if df.height() == 0 {
        return Ok(false);
    }
    let normalized = diff::normalize(df)?;
    report::write_report(&normalized, &config.output_path)?;
    Ok(true)
}

fn log_equivalence(outcome: &Equivalence) {
    if outcome.equal {
        info!("Validation: Both methods produce identical results!");
    } else {
        warn!(
            only_relational = outcome.diff.only_left.len(),
            only_tabular = outcome.diff.only_right.len(),
            mismatched = outcome.diff.mismatched.len(),
            duplicate_relational = outcome.diff.duplicates_left.len(),
            duplicate_tabular = outcome.diff.duplicates_right.len(),
            schema_mismatch = outcome.diff.schema_mismatch.as_deref().unwrap_or("none"),
            "Validation: Methods produce different results!"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::read_report_rows;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AnalysisConfig {
        AnalysisConfig::new(dir.path().join("sales.db"), dir.path().join("output.csv"))
    }

    #[test]
    fn test_missing_source_is_seeded_and_run_completes() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);

        let output = run_pipeline(&config);
        assert!(output.summary.seeded);
        assert_eq!(output.summary.relational_rows, Some(6));
        assert_eq!(output.summary.tabular_rows, Some(6));
        assert_eq!(output.summary.equivalent, Some(true));
        assert_eq!(output.summary.report_path, Some(config.output_path.clone()));
        assert!(output.summary.errors.is_empty());
        assert_eq!(read_report_rows(&config.output_path).unwrap().len(), 6);
    }

    #[test]
    fn test_contract_violation_drops_only_tabular_path() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        crate::seed::seed_sample_database(&config.db_path).unwrap();
        let conn = Connection::open(&config.db_path).unwrap();
        conn.execute("INSERT INTO Orders VALUES (1, 42, 3)", []).unwrap();
        drop(conn);

        let output = run_pipeline(&config);
        assert!(output.summary.any_result());
        assert!(output.relational.is_some());
        assert!(output.tabular.is_none());
        assert_eq!(output.summary.equivalent, None);
        assert_eq!(output.summary.contract_violations().count(), 1);
        assert_eq!(output.summary.report_path, Some(config.output_path.clone()));
    }

    #[test]
    fn test_unusable_source_yields_no_result() {
        let temp_dir = TempDir::new().unwrap();
        let config = config(&temp_dir);
        std::fs::write(&config.db_path, b"definitely not sqlite").unwrap();

        let output = run_pipeline(&config);
        assert!(!output.summary.any_result());
        assert!(output.summary.report_path.is_none());
        assert!(!config.output_path.exists());
        assert!(output.summary.contract_violations().next().is_none());
    }
}

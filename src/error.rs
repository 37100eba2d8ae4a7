use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Source missing, connection failure or malformed query.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Report could not be written or read back.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Source data breaks a documented schema invariant.
    #[error("Data contract violation: {0}")]
    DataContract(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl AnalysisError {
    /// Contract violations are reported loudly; the other kinds only downgrade a stage.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AnalysisError::DataContract(_))
    }
}

impl From<polars::error::PolarsError> for AnalysisError {
    fn from(err: polars::error::PolarsError) -> Self {
        AnalysisError::Polars(err.to_string())
    }
}

impl From<rusqlite::Error> for AnalysisError {
    fn from(err: rusqlite::Error) -> Self {
        AnalysisError::DataAccess(err.to_string())
    }
}

impl From<csv::Error> for AnalysisError {
    fn from(err: csv::Error) -> Self {
        AnalysisError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

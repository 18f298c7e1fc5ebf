//! Error kinds raised by the ETL job
//!
//! Components return `eyre::Result` and put one of these kinds at the root of
//! the report, so the top-level handler (and tests) can tell failures apart
//! with `Report::downcast_ref::<EtlError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    /// Missing or invalid config file, or a missing required field
    #[error("configuration error: {0}")]
    Config(String),

    /// The source CSV file does not exist
    #[error("CSV file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Malformed source data
    #[error("error reading CSV file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Connection or bulk-insert failure
    #[error("error loading to Snowflake: {0}")]
    Load(String),
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::Load(message.into())
    }
}

/// Find the [`EtlError`] kind carried by a report, if any
pub fn error_kind(report: &eyre::Report) -> Option<&EtlError> {
    report.downcast_ref::<EtlError>()
}

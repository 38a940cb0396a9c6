//! Error types for the cytometry pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input file does not exist
    #[error("Missing input: {} not found", .0.display())]
    MissingInput(PathBuf),

    /// Input header lacks required columns
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A data row could not be parsed
    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema Store or configuration error
    #[error(transparent)]
    Store(#[from] cyto_common::Error),

    /// Nothing to analyse (empty cohort, single group present)
    #[error("No data: {0}")]
    NoData(String),

    /// Too few observations for the configured test
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Sample whose population counts sum to zero, under the `fail` policy
    #[error("Sample {0} has a total cell count of zero")]
    ZeroTotal(String),

    /// Plot rendering failed
    #[error("Render error: {0}")]
    Render(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

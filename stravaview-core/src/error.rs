//! Error types for stravaview-core

use thiserror::Error;

/// Main error type for the stravaview-core library
#[derive(Error, Debug)]
pub enum Error {
    /// A required column is missing from the raw table
    #[error("schema error: required column `{column}` is missing")]
    Schema { column: String },

    /// Wrong number of metric labels for a comparison chart
    #[error("expected {expected} metric labels, got {got}")]
    Arity { expected: usize, got: usize },

    /// Label not present in the metric registry
    #[error("unknown metric label: {0}")]
    UnknownMetric(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Raw data source error (network, remote API)
    #[error("source error: {0}")]
    Source(String),
}

/// Result type alias for stravaview-core
pub type Result<T> = std::result::Result<T, Error>;

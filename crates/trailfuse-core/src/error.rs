//! Error types for trailfuse

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrailError {
    // Time normalization errors
    #[error("Could not detect a time format for column(s) {columns}: {reason}")]
    FormatUndetected { columns: String, reason: String },

    #[error("Too many invalid time values: {invalid} of {total} rows could not be parsed")]
    TooManyInvalidTimes { invalid: usize, total: usize },

    // Schema errors
    #[error("Unrecognized table schema. Expected one of: {expected}")]
    SchemaUnrecognized { expected: String },

    #[error("Row {row} rejected (column '{column}'): {reason}")]
    RowRejected {
        row: usize,
        column: String,
        reason: String,
    },

    #[error("No valid rows found in {file_type} data")]
    NoValidRows { file_type: String },

    // Format errors
    #[error("Unsupported file extension '.{extension}'. Supported: {}", supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },

    #[error("{format} error: {message}")]
    FormatError { format: String, message: String },

    #[error("{format} validation failed: {reason}")]
    FormatValidation { format: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // Map image errors
    #[error("Map image fetch failed: {reason}")]
    MapFetch { reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, TrailError>;

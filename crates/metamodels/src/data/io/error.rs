//! Shared error types for table I/O.

use std::io;

use crate::data::DataError;

/// Errors that can occur when loading a table.
#[derive(Debug, thiserror::Error)]
pub enum DatasetLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unsupported ARFF feature on line {line}: {feature}")]
    Unsupported { line: usize, feature: String },

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("unsupported column type for {column}: expected {expected}, got {got}")]
    UnsupportedType {
        column: String,
        expected: String,
        got: String,
    },

    #[error("missing value in column {column}, row {row}")]
    MissingValue { column: String, row: usize },

    #[error(transparent)]
    Data(#[from] DataError),
}

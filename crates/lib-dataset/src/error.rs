//! Error types for dataset reading and writing.

use lib_types::TableShape;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing a table.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// I/O error reading the input file.
    #[error("Unable to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A token that is not a decimal number.
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// A row whose column count differs from the first data row.
    #[error("Row at line {line} has {actual} columns, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        actual: usize,
    },

    /// The table does not have the required shape.
    #[error("Data shape mismatch in '{path}': expected {expected}, got {actual}")]
    ShapeMismatch {
        path: PathBuf,
        expected: TableShape,
        actual: TableShape,
    },

    /// A record does not fit the table it is pushed into.
    #[error("Record width mismatch: expected {expected} columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    /// A record pushed into a table that is already full.
    #[error("Table is full: all {capacity} rows are already filled")]
    TableFull { capacity: usize },

    /// The output directory or file could not be created or written.
    #[error("Unable to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DatasetError {
    /// Create a syntax error at a specific location.
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create an I/O error for a path being read.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a write error for a path being written.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Whether this error rejects an input table.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Syntax { .. } | Self::RaggedRow { .. } | Self::ShapeMismatch { .. }
        )
    }

    /// Whether this error happened writing the output table.
    pub fn is_write_error(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// Result type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

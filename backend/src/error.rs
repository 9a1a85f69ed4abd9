//! Error types for the dataprep engine.
//!
//! Errors are layered the same way the engine is:
//!
//! - [`LoadError`] - reading CSV/Parquet bytes into a table
//! - [`ExportError`] - writing a table back out
//! - [`OpError`] - a transformation rejected its input
//! - [`SessionError`] - session-level orchestration (wraps the above)
//! - [`PipelineError`] - recipe execution
//! - [`ServerError`] - HTTP surface
//! - [`ConfigError`] - environment configuration
//!
//! Conversion is automatic via `From` so `?` works across layers.

use thiserror::Error;

use crate::table::ColumnKind;

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while loading a dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file extension (or requested format) is not CSV or Parquet.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Malformed content: ragged rows, bad encoding, corrupt Parquet.
    #[error("Failed to parse file: {0}")]
    Parse(String),

    /// Explicit column names do not match the number of parsed columns.
    #[error("Expected {columns} column names, got {names}")]
    ColumnCountMismatch { names: usize, columns: usize },

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing a table.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(String),

    #[error("Parquet export failed: {0}")]
    Parquet(String),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Operation Errors
// =============================================================================

/// Errors raised by a transformation before it produces a new table.
#[derive(Debug, Error)]
pub enum OpError {
    /// Referenced column is absent from the table.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The operation needs a different column kind.
    #[error("Column '{column}' is {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: ColumnKind,
    },

    /// Parameters are incomplete or contradictory.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A column does not have the table's row count.
    #[error("Column '{column}' has {found} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

impl OpError {
    pub fn type_mismatch(column: &str, expected: impl Into<String>, found: ColumnKind) -> Self {
        OpError::TypeMismatch {
            column: column.to_string(),
            expected: expected.into(),
            found,
        }
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors surfaced by [`crate::session::Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Nothing has been loaded yet (or the last load failed).
    #[error("No table loaded")]
    NoTable,
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Recipe execution errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A recipe step failed; earlier steps stay applied.
    #[error("Step {index} ({operation}) failed: {source}")]
    Step {
        index: usize,
        operation: String,
        #[source]
        source: SessionError,
    },

    #[error("Invalid recipe: {0}")]
    Recipe(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type LoadResult<T> = Result<T, LoadError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type OpResult<T> = Result<T, OpError>;

pub type SessionResult<T> = Result<T, SessionError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let load_err = LoadError::UnsupportedFormat("xlsx".into());
        let session_err: SessionError = load_err.into();
        assert!(session_err.to_string().contains("xlsx"));

        let op_err = OpError::ColumnNotFound("age".into());
        let session_err: SessionError = op_err.into();
        let server_err: ServerError = session_err.into();
        assert!(server_err.to_string().contains("age"));
    }

    #[test]
    fn test_type_mismatch_format() {
        let err = OpError::type_mismatch("city", "number", ColumnKind::Text);
        let msg = err.to_string();
        assert!(msg.contains("city"));
        assert!(msg.contains("text"));
        assert!(msg.contains("number"));
    }

    #[test]
    fn test_column_count_mismatch_format() {
        let err = LoadError::ColumnCountMismatch { names: 2, columns: 3 };
        assert_eq!(err.to_string(), "Expected 3 column names, got 2");
    }
}

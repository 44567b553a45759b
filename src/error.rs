use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Error type returned across reading, inference, planning, and writing.
///
/// Orchestration never propagates these out of [`crate::orchestrator::Importer::run`]; each
/// source's failure is attached to its [`crate::orchestrator::SourceReport`] instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Workbook error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Database connection or introspection error outside of a chunk write.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The file extension does not map to a supported format.
    #[error("unsupported file type '{extension}' for path ({})", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The source is unreadable as a table (no columns, no rows, bad headers).
    #[error("schema inference failed for {origin}: {message}")]
    Inference { origin: String, message: String },

    /// The target table exists and the policy is `fail`.
    #[error("table '{table}' already exists")]
    TableExists { table: String },

    /// Strict schema mode rejected the import.
    #[error("schema incompatible with table '{table}': {reason}")]
    SchemaIncompatible { table: String, reason: String },

    /// A chunk failed to commit. Earlier chunks stay committed.
    #[error("write to '{table}' failed after {committed_rows} committed rows: {message}")]
    Write {
        table: String,
        committed_rows: u64,
        message: String,
    },

    /// A raw name cannot be turned into a valid, unique table identifier.
    #[error("cannot derive a table name from '{raw}': {message}")]
    Sanitization { raw: String, message: String },

    /// Invalid configuration (connection string, chunk size, ...).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ImportError {
    /// Short, stable label used in reports and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Io(_) => "io",
            ImportError::Csv(_) => "csv",
            #[cfg(feature = "excel")]
            ImportError::Excel(_) => "excel",
            ImportError::Database(_) => "database",
            ImportError::UnsupportedFormat { .. } => "unsupported_format",
            ImportError::Inference { .. } => "inference",
            ImportError::TableExists { .. } => "table_exists",
            ImportError::SchemaIncompatible { .. } => "schema_incompatible",
            ImportError::Write { .. } => "write",
            ImportError::Sanitization { .. } => "sanitization",
            ImportError::Config { .. } => "config",
        }
    }

    /// Rows committed before the failure; non-zero only for [`ImportError::Write`].
    pub fn committed_rows(&self) -> u64 {
        match self {
            ImportError::Write { committed_rows, .. } => *committed_rows,
            _ => 0,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        ImportError::Config {
            message: message.into(),
        }
    }
}

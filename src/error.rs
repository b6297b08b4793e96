//! Error taxonomy shared by the provider, repositories and connection manager.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised while reading, normalizing or persisting EOD data.
///
/// None of these are retried internally; every variant is surfaced to the
/// immediate caller.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store file could not be opened (missing directory, permissions, lock).
    #[error("cannot open store {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A raw file could not be read from disk.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw file was readable but its tabular content is malformed.
    #[error("cannot parse {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    /// A required semantic column is absent.
    #[error("required column '{column}' not found in {origin}")]
    Schema { column: String, origin: String },

    /// A required field is absent from an upsert record.
    #[error("required field '{field}' missing in {record}")]
    Validation { field: String, record: String },

    /// A value could not be converted to its target type.
    #[error("cannot convert {column} value '{value}' on row {row} to {expected}")]
    Coercion {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },

    /// No trading date from the caller and no date column in the file.
    #[error("no trading date given and no date column in {}", path.display())]
    MissingDate { path: PathBuf },

    /// A statement failed inside an open scope.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl IngestError {
    /// Short label for the error kind, used in user-facing output.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Open { .. } => "open",
            IngestError::Io { .. } | IngestError::Read { .. } => "io",
            IngestError::Schema { .. } => "schema",
            IngestError::Validation { .. } => "validation",
            IngestError::Coercion { .. } => "coercion",
            IngestError::MissingDate { .. } => "missing-date",
            IngestError::Storage(_) => "storage",
        }
    }

    pub(crate) fn schema(column: impl Into<String>, origin: impl Into<String>) -> Self {
        IngestError::Schema {
            column: column.into(),
            origin: origin.into(),
        }
    }
}

// ⚠️ Error Taxonomy
// Fatal conditions only. Row-level problems are LoadWarnings, identifier
// problems are ConflictRecords, and discrepancies are DiffRecords.

use crate::parser::SourceFormat;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// SOURCE ERRORS (loaders)
// ============================================================================

#[derive(Debug, Error)]
pub enum SourceError {
    /// Structure is unusable: missing columns/sections, not JSON, empty file
    #[error("{format} source '{origin}' is malformed: {expectation}")]
    MalformedSource {
        format: SourceFormat,
        origin: String,
        expectation: String,
    },

    #[error("{format} source '{origin}' could not be read: {source}")]
    Unreadable {
        format: SourceFormat,
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot tell which kind of source '{origin}' is; declare its kind explicitly")]
    UnknownFormat { origin: String },
}

impl SourceError {
    pub fn malformed(format: SourceFormat, origin: &str, expectation: impl Into<String>) -> Self {
        SourceError::MalformedSource {
            format,
            origin: origin.to_string(),
            expectation: expectation.into(),
        }
    }
}

// ============================================================================
// RECONCILE ERRORS (builder)
// ============================================================================

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no nomenclature reference among the {0} supplied sources; gene identity cannot be resolved")]
    MissingNomenclature(usize),
}

// ============================================================================
// EMIT ERRORS (artifact boundary)
// ============================================================================

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("cannot write to '{}': {source}", path.display())]
    UnwritableDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {artifact}: {message}")]
    Encode { artifact: String, message: String },
}

impl EmitError {
    pub fn unwritable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EmitError::UnwritableDestination {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// DATABASE ERRORS (snapshot read)
// ============================================================================

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("invalid {table} row '{key}': {message}")]
    InvalidRow {
        table: &'static str,
        key: String,
        message: String,
    },

    #[error("database has no '{0}' table; it was not created by this tool")]
    MissingTable(&'static str),
}

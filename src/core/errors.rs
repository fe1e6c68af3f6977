/*!
 * Error Types
 * Structured, type-safe error handling for browser operations
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core operation result
///
/// # Must Use
/// Operations can fail and must be handled to prevent silent inconsistency
#[must_use = "operations can fail and must be handled"]
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the resolution, indexing, and mutation paths
///
/// Serialization uses the tagged enum pattern so outer layers can map
/// variants onto response codes without string matching.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// Convert std::io::Error to CoreError with context
    pub fn from_io(e: std::io::Error, context: impl Into<String>) -> Self {
        use std::io::ErrorKind;
        let context = context.into();
        match e.kind() {
            ErrorKind::NotFound => CoreError::NotFound(context),
            ErrorKind::AlreadyExists => CoreError::Conflict(context),
            _ => CoreError::Io(format!("{}: {}", context, e)),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, _) = &e {
            if err.code == rusqlite::ErrorCode::ConstraintViolation {
                return CoreError::Conflict(e.to_string());
            }
        }
        CoreError::Storage(e.to_string())
    }
}

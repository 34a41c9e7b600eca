//! Error types for pgmig.

use std::path::PathBuf;

use thiserror::Error;

use crate::source::Direction;

/// The main error type for migration operations.
///
/// Every variant aborts the current invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Missing or invalid configuration (credentials, paths, arguments).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A migration file lacks the script needed for the requested direction.
    #[error("No {direction} section in {filename}")]
    Content {
        filename: String,
        direction: Direction,
    },

    /// The ledger references a migration whose file no longer exists.
    #[error("File not found for applied migration {0}")]
    NotFound(i64),

    /// Two files on disk claim the same migration id.
    #[error("Duplicate migration id {id}: {first} and {second}")]
    DuplicateId {
        id: i64,
        first: String,
        second: String,
    },

    /// The database rejected a migration script or its ledger update.
    #[error("Failed: {filename}\n{source}")]
    Execution {
        filename: String,
        #[source]
        source: sqlx::Error,
    },

    /// Connection or ledger setup failure.
    #[error("Database error: {0}")]
    Transport(#[source] sqlx::Error),

    /// IO error while reading or writing migration files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Create a content error for the given file and direction.
    pub fn content(filename: impl Into<String>, direction: Direction) -> Self {
        Self::Content {
            filename: filename.into(),
            direction,
        }
    }

    /// Wrap a database failure with the migration it happened in.
    pub fn execution(filename: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Execution {
            filename: filename.into(),
            source,
        }
    }

    /// Configuration error for a path that should exist but doesn't.
    pub fn missing_path(path: impl Into<PathBuf>) -> Self {
        Self::Config(format!("Not found: {}", path.into().display()))
    }
}

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

//! Error taxonomy for the archival stage.
//!
//! Each variant family maps to one failure category an archival run can end
//! in. None of them are retried here; the caller decides what to do with a
//! failed run (the CLI reports and exits with status 1).

use std::path::PathBuf;
use thiserror::Error;

/// Result type for archival operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised by the archival components.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A required input field is absent or malformed.
    #[error("invalid input: field '{field}' {reason}")]
    Validation { field: &'static str, reason: String },

    /// The input envelope is not a JSON object we can read.
    #[error("invalid input envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The next fragment id could not be determined.
    #[error("id allocation failed: {0}")]
    Allocation(String),

    /// The counter record moved between read and swap.
    #[error("id allocation conflict: expected last id {expected}, found {found}")]
    AllocationConflict { expected: u32, found: u32 },

    /// A fragment file already exists at the target path.
    #[error("fragment path already exists: {}", .0.display())]
    Collision(PathBuf),

    /// Writing the fragment file failed.
    #[error("failed to write fragment {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The metadata index could not be read, parsed, or persisted.
    #[error("metadata index error: {0}")]
    Index(String),

    /// Staging or committing into version history failed.
    #[error("repository error: {0}")]
    Repository(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the failure category, used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::Envelope(_) => "validate",
            Self::Allocation(_) | Self::AllocationConflict { .. } => "allocate",
            Self::Collision(_) | Self::Write { .. } => "write",
            Self::Index(_) => "index",
            Self::Repository(_) => "commit",
            Self::Io { .. } => "io",
        }
    }
}

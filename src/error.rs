//! Error Types
//!
//! Typed failures raised by the search core. Only failures that make a request
//! meaningless are represented here; per-record and per-hit problems are
//! recovered where they occur and never reach the caller.

use std::path::PathBuf;

/// An on-disk artifact (vector index or metadata file) could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The artifact this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Corrupt { path, .. } => path,
        }
    }
}

/// Failure of a single search request.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl SearchError {
    /// Whether the failure was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}

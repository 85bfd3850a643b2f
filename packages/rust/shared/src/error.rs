//! Error types for QnaSync.
//!
//! Library crates use [`QnaSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Boxed underlying cause carried by [`QnaSyncError::Remote`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all QnaSync operations.
#[derive(Debug, thiserror::Error)]
pub enum QnaSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A call to the knowledge-base service failed.
    ///
    /// Non-success statuses, transport failures and undecodable responses
    /// all end up here. Callers never need to look at HTTP status codes.
    #[error("remote call failed: {message}")]
    Remote {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Content repository error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed input supplied by the host (fixtures, ids, events).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QnaSyncError>;

impl QnaSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a remote error with no underlying cause.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a remote error that keeps the original failure as its source.
    pub fn remote_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Remote {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the knowledge-base service.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

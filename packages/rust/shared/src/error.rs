//! Error types for Courseware.
//!
//! Library crates use [`CoursewareError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::sync::Arc;

/// Top-level error type for all Courseware operations.
#[derive(Debug, thiserror::Error)]
pub enum CoursewareError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Course content could not be loaded (owner torn down or querier failure).
    #[error("course content load error: {message}")]
    ContentLoad { message: String },

    /// A block identifier did not resolve to a block in the course tree.
    #[error("block not found: {0}")]
    NotFound(String),

    /// Network/HTTP error while loading a page.
    #[error("network error: {0}")]
    Network(String),

    /// The server demanded credentials that could not be supplied.
    #[error("credential error for host {host}")]
    Credential { host: String },

    /// Course data or URL parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (dangling child ids, missing root, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CoursewareError>;

/// Error shared between every listener of a stage.
pub type SharedError = Arc<CoursewareError>;

impl CoursewareError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a content-load error from any displayable message.
    pub fn content_load(msg: impl Into<String>) -> Self {
        Self::ContentLoad {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
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
}

//! Error types for docgraph.
//!
//! Library crates use [`DocGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum DocGraphError {
    /// Configuration loading or resolution error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed CLI input (credential shape, argument count, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A collector failed to register or failed while producing documents.
    #[error("collector {collector} failed: {message}")]
    Collector { collector: String, message: String },

    /// A document could not be parsed into a document tree.
    #[error("process error: {message}")]
    Process { message: String },

    /// Facts could not be extracted from a document tree.
    #[error("ingest error: {message}")]
    Ingest { message: String },

    /// Graph store or connectivity error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocGraphError>;

impl DocGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a collector error attributed to the named collector.
    pub fn collector(collector: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Collector {
            collector: collector.into(),
            message: msg.into(),
        }
    }

    /// Create a process error from any displayable message.
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process {
            message: msg.into(),
        }
    }

    /// Create an ingest error from any displayable message.
    pub fn ingest(msg: impl Into<String>) -> Self {
        Self::Ingest {
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

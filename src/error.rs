//! Structured error types for configuration operations.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors
    Configuration,
    PermissionDenied,
    UnsupportedSource,
    InvalidFilter,

    // Backing store errors
    SourceIo,
    SourceFormat,
    Remote,
}

/// Errors raised by sources, the merge engine and the [`Config`](crate::config::Config)
/// orchestrator.
#[derive(Debug, Error)]
pub enum ConfettiError {
    /// Nothing to route a write to, or a malformed setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A staged change targets a source registered as read-only.
    #[error("source {source_id} is not writable")]
    PermissionDenied { source_id: String },

    /// No adapter knows how to open this path or URI.
    #[error("unsupported source type: {0}")]
    UnsupportedSource(String),

    #[error("invalid include pattern {pattern:?}: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("key-value store {source_id} failed: {source}")]
    KeyValue {
        source_id: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("request to {source_id} failed: {source}")]
    Remote {
        source_id: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ConfettiError {
    // Convenience constructors

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn permission_denied(source_id: &str) -> Self {
        Self::PermissionDenied {
            source_id: source_id.to_string(),
        }
    }

    pub fn unsupported(location: impl fmt::Display) -> Self {
        Self::UnsupportedSource(location.to_string())
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &Path, err: impl fmt::Display) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn remote(source_id: &str, source: reqwest::Error) -> Self {
        Self::Remote {
            source_id: source_id.to_string(),
            source,
        }
    }

    pub fn key_value(source_id: &str, source: redis::RedisError) -> Self {
        Self::KeyValue {
            source_id: source_id.to_string(),
            source,
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::UnsupportedSource(_) => ErrorCode::UnsupportedSource,
            Self::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            Self::Io { .. } => ErrorCode::SourceIo,
            Self::Format { .. } => ErrorCode::SourceFormat,
            Self::KeyValue { .. } | Self::Remote { .. } => ErrorCode::Remote,
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfettiError>;

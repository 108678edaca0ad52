//! Error types for geofill.
//!
//! Library crates use [`GeofillError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all geofill operations.
#[derive(Debug, thiserror::Error)]
pub enum GeofillError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the geocoding provider.
    #[error("network error: {0}")]
    Network(String),

    /// Input record source error (unreadable file or undecodable row).
    #[error("input error: {message}")]
    Source { message: String },

    /// Result store or state file error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad endpoint, out-of-range tunable, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GeofillError>;

impl GeofillError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an input source error from any displayable message.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = GeofillError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = GeofillError::validation("max_calls must be at least 1");
        assert!(err.to_string().contains("max_calls"));

        let err = GeofillError::Network("connection refused".into());
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}

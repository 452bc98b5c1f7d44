//! Error types for bundlebot.
//!
//! Library crates use [`BundleError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all bundlebot operations.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The manifest could not be opened or parsed. Fatal for a run.
    #[error("manifest unreadable at {path:?}: {message}")]
    ManifestUnreadable { path: PathBuf, message: String },

    /// The catalog did not yield a download location for a code.
    #[error("could not resolve code {code}: {reason}")]
    ResolutionFailed { code: String, reason: String },

    /// A document download failed.
    #[error("could not fetch code {code}: {reason}")]
    FetchFailed { code: String, reason: String },

    /// The merge codec rejected the input set.
    #[error("merge failed: {reason}")]
    MergeFailed { reason: String },

    /// Network/HTTP client error outside of a single code's lookup.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad cell reference, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BundleError>;

impl BundleError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a manifest error for the given source path.
    pub fn manifest(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ManifestUnreadable {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn resolution(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn merge(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
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
        let err = BundleError::config("missing base_url");
        assert_eq!(err.to_string(), "config error: missing base_url");

        let err = BundleError::resolution("12345", "download link not found");
        assert_eq!(
            err.to_string(),
            "could not resolve code 12345: download link not found"
        );

        let err = BundleError::merge("no input documents");
        assert!(err.to_string().contains("no input documents"));
    }
}

//! Error types for WebAI.
//!
//! Library crates use [`WebAiError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all WebAI operations.
#[derive(Debug, thiserror::Error)]
pub enum WebAiError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The seed URL could not be fetched; the crawl produced nothing.
    #[error("seed unreachable: {url}: {reason}")]
    SeedUnreachable { url: String, reason: String },

    /// Network/HTTP error outside of a crawl (client construction, etc.).
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (out-of-range setting, empty corpus, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WebAiError>;

impl WebAiError {
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

    /// Report that the crawl could not reach its seed.
    pub fn seed_unreachable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SeedUnreachable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is the crawl-level seed failure.
    pub fn is_seed_unreachable(&self) -> bool {
        matches!(self, Self::SeedUnreachable { .. })
    }
}

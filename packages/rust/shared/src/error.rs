//! Error types for Tidewatch.
//!
//! Library crates use [`TidewatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Tidewatch operations.
#[derive(Debug, thiserror::Error)]
pub enum TidewatchError {
    /// Configuration loading or validation error. Always fatal at startup.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the search API.
    #[error("network error: {0}")]
    Network(String),

    /// The search API answered with an error status or error payload.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad timestamp, empty key, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TidewatchError>;

impl TidewatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Whether a later attempt could plausibly succeed without operator action.
    ///
    /// Used by the ingestion loop to pick a log level; every per-tick error is
    /// swallowed regardless.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Storage(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = TidewatchError::config("TWITTER_BEARER_TOKEN is not set");
        assert_eq!(
            err.to_string(),
            "config error: TWITTER_BEARER_TOKEN is not set"
        );

        let err = TidewatchError::Api {
            status: 401,
            message: "Unauthorized".into(),
        };
        assert_eq!(err.to_string(), "api error (status 401): Unauthorized");
    }

    #[test]
    fn transient_classification() {
        assert!(TidewatchError::Network("timed out".into()).is_transient());
        assert!(TidewatchError::Storage("locked".into()).is_transient());
        assert!(
            TidewatchError::Api {
                status: 429,
                message: "Too Many Requests".into()
            }
            .is_transient()
        );
        assert!(
            TidewatchError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !TidewatchError::Api {
                status: 401,
                message: "Unauthorized".into()
            }
            .is_transient()
        );
        assert!(!TidewatchError::parse("bad json").is_transient());
        assert!(!TidewatchError::config("missing").is_transient());
    }
}

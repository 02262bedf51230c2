/// Structured error types for forumplan-core.
///
/// `PlanError` covers planning and configuration failures, which propagate
/// to the caller. `ProviderError` covers external text generation failures,
/// which the calendar assembler contains and turns into template fallback.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for forumplan-core operations
#[derive(Error, Debug)]
pub enum PlanError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// TOML config could not be parsed
    #[error("Invalid TOML in {path:?}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Config file not found
    #[error("Path not found: {path:?}")]
    PathNotFound { path: PathBuf },

    /// Generation configuration cannot produce a calendar
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for forumplan-core operations
pub type Result<T> = std::result::Result<T, PlanError>;

impl PlanError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a TOML parse error for a config file
    pub fn toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Toml {
            path: path.into(),
            source,
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Failure of an external text generation request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}

impl ProviderError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

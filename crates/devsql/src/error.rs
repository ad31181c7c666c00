//! Error types for devsql

use thiserror::Error;

/// Result type alias for devsql operations
pub type DevSqlResult<T> = Result<T, DevSqlError>;

/// Error types for devsql.
///
/// Errors raised by the wrapped database client are passed through as-is;
/// the instrumented client never rewraps them.
#[derive(Debug, Error)]
pub enum DevSqlError {
    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configured filter pattern is not a valid regex
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Failed to read a config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a TOML config file
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A global tracing subscriber could not be installed
    #[error("Subscriber init error: {0}")]
    SubscriberInit(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DevSqlError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

//! Error types for the data-access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. The taxonomy separates caller bugs (`Translation`), statements the
//! store rejected (`QueryExecution`) and transient connectivity loss
//! (`Connection`, `Timeout`); only the latter two are retried. Classification
//! of raw driver failures is centralized in [`connection_class`] so it can be
//! tested apart from the execution path.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("invalid connection configuration: {message}")]
    Configuration { message: String },

    #[error("connection failed after {attempts} attempt(s): {message}")]
    Connection { message: String, attempts: u32 },

    #[error("{operation} timed out after {elapsed_ms}ms (attempt {attempts})")]
    Timeout {
        operation: String,
        elapsed_ms: u64,
        attempts: u32,
    },

    #[error("translation failed: {message}")]
    Translation { message: String },

    #[error("query rejected by server: {message}")]
    QueryExecution {
        message: String,
        /// Server error number, e.g. 2627 for a unique-key violation.
        code: Option<u32>,
    },

    #[error("connection pool unavailable: {message}")]
    PoolExhausted { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error for a first attempt.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            attempts: 1,
        }
    }

    /// Create a timeout error for a first attempt.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: elapsed.as_millis() as u64,
            attempts: 1,
        }
    }

    /// Create a translation error.
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
        }
    }

    /// Create a query execution error with an optional server error number.
    pub fn execution(message: impl Into<String>, code: Option<u32>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
        }
    }

    /// Create a pool exhaustion error.
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::PoolExhausted {
            message: message.into(),
        }
    }

    /// Annotate the error with the number of attempts that were made before it
    /// reached the caller. Variants that carry no attempt count are returned
    /// unchanged.
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            Self::Connection { message, .. } => Self::Connection { message, attempts },
            Self::Timeout {
                operation,
                elapsed_ms,
                ..
            } => Self::Timeout {
                operation,
                elapsed_ms,
                attempts,
            },
            other => other,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Decide whether a raw driver error message describes a connection-class
/// failure (the connection closed, broke, or never came up) rather than a
/// statement the server rejected.
pub fn connection_class(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "connection closed",
        "connection is closed",
        "connection not yet open",
        "connection lost",
        "connection reset",
        "connection refused",
        "broken pipe",
        "forcibly closed",
        "timed out",
        "request timeout",
        "socket hang up",
        "i/o failure",
        "tls failure",
    ];

    let lower = message.to_lowercase();
    MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Convert tiberius errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(error: tiberius::error::Error) -> Self {
        use tiberius::error::Error as Tds;

        match error {
            Tds::Io { message, .. } => DbError::connection(format!("I/O failure: {message}")),
            Tds::Tls(message) => DbError::connection(format!("TLS failure: {message}")),
            Tds::Routing { .. } => {
                DbError::connection("server requested connection rerouting".to_string())
            }
            Tds::Server(token) => {
                let message = token.message().to_string();
                if connection_class(&message) {
                    DbError::connection(message)
                } else {
                    DbError::execution(message, Some(token.code()))
                }
            }
            Tds::Protocol(message) => {
                let message = message.to_string();
                if connection_class(&message) {
                    DbError::connection(message)
                } else {
                    DbError::execution(message, None)
                }
            }
            other => DbError::execution(other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

//! Engine error types
//!
//! `EngineError` covers opening the engine and is always fatal.
//! `QueryError` is a statement failure reported back to the caller with
//! the engine's SQLSTATE code when one exists.

use thiserror::Error;

/// Result type for engine lifecycle operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for statement execution
pub type QueryResult<T> = Result<T, QueryError>;

/// Engine lifecycle errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Installing binaries or initialising the data directory failed
    #[error("Engine setup failed: {0}")]
    Setup(#[source] postgresql_embedded::Error),

    /// The server process did not start
    #[error("Engine start failed: {0}")]
    Start(#[source] postgresql_embedded::Error),

    /// Creating or probing the application database failed
    #[error("Database provisioning failed: {0}")]
    Provision(#[source] postgresql_embedded::Error),

    /// The session connection could not be established
    #[error("Session connect failed: {0}")]
    Connect(#[source] tokio_postgres::Error),

    /// Stopping the server failed
    #[error("Engine stop failed: {0}")]
    Stop(#[source] postgresql_embedded::Error),
}

/// A failed statement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    /// SQLSTATE reported by the engine
    pub code: Option<String>,
    /// Engine message
    pub message: String,
}

impl QueryError {
    /// Create an error with an engine code
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create an error without an engine code
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Result column type the session cannot represent as JSON
    pub fn unsupported_type(column: &str, type_name: &str) -> Self {
        Self::message(format!(
            "Unsupported column type {} for column \"{}\"",
            type_name, column
        ))
    }

    /// Column bytes that did not match their declared type
    pub fn decode(column: &str, err: &dyn std::error::Error) -> Self {
        Self::message(format!("Could not decode column \"{}\": {}", column, err))
    }
}

impl From<tokio_postgres::Error> for QueryError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => Self::new(db.code().code(), db.message()),
            None => Self::message(err.to_string()),
        }
    }
}

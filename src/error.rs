//! Error types for the database browser.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! The variants follow the browser's failure taxonomy: connection failures are fatal
//! for a request, introspection failures are recovered per unit by the analyzer,
//! query failures are surfaced verbatim with the engine's error number, and
//! validation failures are raised before any database work happens.

use thiserror::Error;

/// SQL Server error number for a failed login.
const LOGIN_FAILED: u32 = 18456;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Introspection failed for {object}: {message}")]
    Introspection { message: String, object: String },

    #[error("Query failed: {message}")]
    QueryExecution {
        message: String,
        /// Engine error number, e.g. 208 for "Invalid object name"
        code: Option<u32>,
        suggestion: String,
    },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Read-only violation: {operation} - {reason}")]
    ReadOnly { operation: String, reason: String },

    #[error("Unsupported database type: {engine}")]
    UnsupportedEngine { engine: String },

    #[error("Annotation failed: {message}")]
    Annotation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an introspection error for one catalog unit (`schema.table`).
    pub fn introspection(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a query execution error with an optional engine error number.
    pub fn query(
        message: impl Into<String>,
        code: Option<u32>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::QueryExecution {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a read-only violation error.
    pub fn read_only(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadOnly {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported engine error.
    pub fn unsupported_engine(engine: impl Into<String>) -> Self {
        Self::UnsupportedEngine {
            engine: engine.into(),
        }
    }

    /// Create an annotation error.
    pub fn annotation(message: impl Into<String>) -> Self {
        Self::Annotation {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error raised when an operation runs before `connect`.
    pub fn not_connected() -> Self {
        Self::connection(
            "Adapter is not connected",
            "Call connect() before issuing catalog or data queries",
        )
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::QueryExecution { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Engine-native error number, when the engine reported one.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::QueryExecution { code, .. } => *code,
            _ => None,
        }
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Introspection { .. } => "introspection",
            Self::QueryExecution { .. } => "query_execution",
            Self::Validation { .. } => "validation",
            Self::ReadOnly { .. } => "read_only",
            Self::UnsupportedEngine { .. } => "unsupported_engine",
            Self::Annotation { .. } => "annotation",
            Self::Internal { .. } => "internal",
        }
    }

    /// Check if this error is retryable.
    ///
    /// Nothing in the crate retries automatically; callers may use this to decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// True for errors caused by malformed caller input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::ReadOnly { .. } | Self::UnsupportedEngine { .. }
        )
    }

    /// HTTP status code used by the transport layer.
    pub fn http_status(&self) -> u16 {
        match self {
            _ if self.is_client_error() => 400,
            Self::Connection { .. } => 502,
            _ => 500,
        }
    }
}

/// Convert TDS driver errors to DbError.
impl From<tiberius::error::Error> for DbError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error as TdsError;

        match err {
            TdsError::Server(token) if token.code() == LOGIN_FAILED => DbError::connection(
                token.message().to_string(),
                "Check the username and password",
            ),
            TdsError::Server(token) => DbError::query(
                token.message().to_string(),
                Some(token.code()),
                "Check the referenced objects, permissions and filter values",
            ),
            TdsError::Io { kind, message } => DbError::connection(
                format!("I/O error ({:?}): {}", kind, message),
                "Check network connectivity and database server status",
            ),
            TdsError::Tls(message) => DbError::connection(
                format!("TLS error: {}", message),
                "Verify the encrypt and trust_server_certificate options",
            ),
            TdsError::Routing { host, port } => DbError::connection(
                format!("Server requested routing to {}:{}", host, port),
                "Connect directly to the routed server",
            ),
            other => DbError::query(
                other.to_string(),
                None,
                "Check the statement and the values bound to it",
            ),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::connection(
            format!("I/O error: {}", err),
            "Check the server address and port",
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

//! Error types for telesink
//!
//! Provides granular error classification so callers can tell which stage of
//! a write failed:
//! - Query building (bad schema tag, serialization failure)
//! - Connection, transaction, execution
//! - Record-id generation (fatal, never retriable)

use std::fmt;
use thiserror::Error;

/// Result type for telesink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Query construction errors (bad schema version, serialization)
    QueryBuild,
    /// Record-id generation failed (corrupted execution environment)
    RecordId,
    /// Connection-related errors (retriable by callers)
    Connection,
    /// Transaction begin/commit errors
    Transaction,
    /// Statement rejected by the backend
    Execution,
    /// Configuration error (bad identifier, malformed DSN)
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable.
    ///
    /// This crate never retries; the classification is for callers that own
    /// a retry policy. Record-id failures must never be retried.
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Main error type for telesink
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Query construction failed
    #[error("query build error: {message}")]
    QueryBuild { message: String },

    /// Record-id generation failed
    #[error("record id generation failed: {message}")]
    RecordId { message: String },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transaction begin or commit failed
    #[error("transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement rejected by the backend
    #[error("execution error: {message}")]
    Execution {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Backend not compiled into this build
    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::QueryBuild { .. } => ErrorCategory::QueryBuild,
            Self::RecordId { .. } => ErrorCategory::RecordId,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Unsupported { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a query build error
    pub fn query_build(message: impl Into<String>) -> Self {
        Self::QueryBuild {
            message: message.into(),
        }
    }

    /// Create a record-id generation error
    pub fn record_id(message: impl Into<String>) -> Self {
        Self::RecordId {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create an execution error carrying the offending SQL
    pub fn execution_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported-backend error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueryBuild => write!(f, "query_build"),
            Self::RecordId => write!(f, "record_id"),
            Self::Connection => write!(f, "connection"),
            Self::Transaction => write!(f, "transaction"),
            Self::Execution => write!(f, "execution"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}

//! Error types
//!
//! [`StoreError`] is what a store backend reports. The repository turns it
//! into a [`RepositoryError`](crate::repository::RepositoryError); anything
//! outside a mapper call (configuration, startup) uses the crate [`Error`].

use std::fmt;

use thiserror::Error;

use crate::repository::RepositoryError;

/// Store call that was executing when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Establishing a connection
    Connect,
    /// Creating the table
    Initialize,
    /// Reading rows
    Select,
    /// Counting rows
    Count,
    /// Executing an insert, update or delete
    Apply,
    /// Allocating a primary key
    NextIdentity,
    /// Transaction management
    Transaction,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Initialize => write!(f, "initialize"),
            Self::Select => write!(f, "select"),
            Self::Count => write!(f, "count"),
            Self::Apply => write!(f, "apply"),
            Self::NextIdentity => write!(f, "next_identity"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Backend cannot be reached right now (I/O, pool, shutdown)
    Unavailable,
    /// A write collided with an existing primary key
    UniqueViolation,
    /// A write broke another constraint (NOT NULL, immutable key)
    ConstraintViolation,
    /// The backend rejected the statement
    QueryFailed,
    /// A returned column had an unexpected type
    Decode,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::UniqueViolation => write!(f, "unique_violation"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::Decode => write!(f, "decode"),
        }
    }
}

/// Structured store error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The store call being performed
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (table name, statement fragment)
    pub context: Option<String>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Backend unavailable
    pub fn unavailable(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Unavailable, message)
    }

    /// Primary key already taken
    pub fn unique_violation(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::UniqueViolation, message)
    }

    /// Some other constraint was violated
    pub fn constraint_violation(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::ConstraintViolation, message)
    }

    /// Statement rejected
    pub fn query_failed(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::QueryFailed, message)
    }

    /// Whether this error is transient
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Unavailable)
    }

    /// Add context to an existing error
    #[must_use]
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Replace the operation
    #[must_use]
    pub fn during(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::PoolTimedOut => Self::unavailable(StoreOperation::Connect, "Connection pool timed out"),
            E::PoolClosed => Self::unavailable(StoreOperation::Connect, "Connection pool is closed"),
            E::WorkerCrashed => Self::unavailable(StoreOperation::Connect, "Database worker crashed"),
            E::Io(e) => Self::unavailable(StoreOperation::Connect, e.to_string()),
            E::Tls(e) => Self::unavailable(StoreOperation::Connect, format!("TLS error: {}", e)),
            E::Configuration(e) => Self::unavailable(StoreOperation::Connect, e.to_string()),
            E::ColumnDecode { index, source } => Self::new(
                StoreOperation::Select,
                StoreErrorKind::Decode,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::new(StoreOperation::Select, StoreErrorKind::Decode, e.to_string()),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation() {
                    StoreErrorKind::UniqueViolation
                } else if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                    StoreErrorKind::ConstraintViolation
                } else if db_err.code().as_deref() == Some("23502") {
                    // not_null_violation
                    StoreErrorKind::ConstraintViolation
                } else {
                    StoreErrorKind::QueryFailed
                };
                Self::new(StoreOperation::Apply, kind, db_err.to_string())
            }
            other => Self::query_failed(StoreOperation::Select, other.to_string()),
        }
    }
}

/// Sanitize a database URL by removing credentials
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos + 1..];
            return format!("{}<redacted>@{}", scheme, after_at);
        }
    }
    url.to_string()
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error for everything outside a mapper call
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured store error
    #[error("{0}")]
    Store(StoreError),

    /// Repository error
    #[error("{0}")]
    Repository(RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging could not be initialised
    #[error("Tracing error: {0}")]
    Tracing(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Error::Store(err)
    }
}

impl From<RepositoryError> for Error {
    fn from(err: RepositoryError) -> Self {
        Error::Repository(err)
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(StoreError::from(err))
    }
}

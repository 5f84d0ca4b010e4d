//! Repository error types
//!
//! Every mapper operation fails with a [`RepositoryError`] carrying the
//! operation that failed, the [`RepositoryErrorKind`] and, where one is
//! involved, the entity and key.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::not_found(RepositoryOperation::SelectByPrimaryKey, "Partition", 42);
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert_eq!(error.entity_id.as_deref(), Some("42"));
//! ```

use std::fmt;

use crate::store::{StoreError, StoreErrorKind};

/// Mapper operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Counting rows matching a criteria
    CountByExample,
    /// Deleting rows matching a criteria
    DeleteByExample,
    /// Deleting one row by key
    DeleteByPrimaryKey,
    /// Inserting a full record
    Insert,
    /// Inserting only the present fields
    InsertSelective,
    /// Reading rows matching a criteria
    SelectByExample,
    /// Reading a window of rows matching a criteria
    SelectByExampleWithRowbounds,
    /// Reading one row by key
    SelectByPrimaryKey,
    /// Patching rows matching a criteria
    UpdateByExampleSelective,
    /// Replacing rows matching a criteria
    UpdateByExample,
    /// Patching one row by key
    UpdateByPrimaryKeySelective,
    /// Replacing one row by key
    UpdateByPrimaryKey,
    /// Checking whether a key exists
    Exists,
    /// Opening, committing or rolling back a transaction
    Transaction,
}

impl RepositoryOperation {
    /// Snake-case name used in logs and error messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CountByExample => "count_by_example",
            Self::DeleteByExample => "delete_by_example",
            Self::DeleteByPrimaryKey => "delete_by_primary_key",
            Self::Insert => "insert",
            Self::InsertSelective => "insert_selective",
            Self::SelectByExample => "select_by_example",
            Self::SelectByExampleWithRowbounds => "select_by_example_with_rowbounds",
            Self::SelectByPrimaryKey => "select_by_primary_key",
            Self::UpdateByExampleSelective => "update_by_example_selective",
            Self::UpdateByExample => "update_by_example",
            Self::UpdateByPrimaryKeySelective => "update_by_primary_key_selective",
            Self::UpdateByPrimaryKey => "update_by_primary_key",
            Self::Exists => "exists",
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Unknown field, type mismatch or malformed operator/value pairing
    InvalidPredicate,
    /// Unknown or unsortable sort field
    InvalidOrdering,
    /// Key-targeted read or update against a missing record
    NotFound,
    /// Insert with a colliding explicit key
    DuplicateKey,
    /// Malformed write payload or page window
    ValidationFailed,
    /// Transient backend failure
    StoreUnavailable,
    /// Raw row could not be decoded into the entity
    SerializationError,
    /// Non-transient backend failure
    StoreError,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPredicate => write!(f, "invalid_predicate"),
            Self::InvalidOrdering => write!(f, "invalid_ordering"),
            Self::NotFound => write!(f, "not_found"),
            Self::DuplicateKey => write!(f, "duplicate_key"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::StoreUnavailable => write!(f, "store_unavailable"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::StoreError => write!(f, "store_error"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use partition_repo::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::invalid_predicate("unknown field 'colour'")
///     .with_operation(RepositoryOperation::CountByExample);
/// assert_eq!(
///     error.to_string(),
///     "Repository invalid_predicate error during count_by_example: unknown field 'colour'"
/// );
/// assert!(!error.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g. "Partition")
    pub entity_type: Option<String>,
    /// The key of the entity involved
    pub entity_id: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// A predicate failed validation
    ///
    /// The operation defaults to `SelectByExample`; callers replace it with
    /// [`with_operation`](Self::with_operation).
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::SelectByExample,
            RepositoryErrorKind::InvalidPredicate,
            message,
        )
    }

    /// An ordering clause failed validation
    pub fn invalid_ordering(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::SelectByExample,
            RepositoryErrorKind::InvalidOrdering,
            message,
        )
    }

    /// A write payload or page window failed validation
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// No record has the requested key
    pub fn not_found(
        operation: RepositoryOperation,
        entity_type: impl Into<String>,
        entity_id: impl ToString,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::NotFound, "Entity not found")
            .with_entity(entity_type, entity_id.to_string())
    }

    /// A row could not be decoded
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the error is transient and the call may succeed on retry
    ///
    /// The repository itself never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, RepositoryErrorKind::StoreUnavailable)
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        let kind = match err.kind {
            StoreErrorKind::Unavailable => RepositoryErrorKind::StoreUnavailable,
            StoreErrorKind::UniqueViolation => RepositoryErrorKind::DuplicateKey,
            StoreErrorKind::ConstraintViolation
            | StoreErrorKind::QueryFailed
            | StoreErrorKind::Decode => RepositoryErrorKind::StoreError,
        };
        // Operation is filled in by the caller
        Self::new(RepositoryOperation::SelectByExample, kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOperation;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(
            format!("{}", RepositoryOperation::SelectByExampleWithRowbounds),
            "select_by_example_with_rowbounds"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::UpdateByPrimaryKeySelective),
            "update_by_primary_key_selective"
        );
        assert_eq!(format!("{}", RepositoryOperation::Exists), "exists");
    }

    #[test]
    fn test_repository_error_kind_display() {
        assert_eq!(
            format!("{}", RepositoryErrorKind::InvalidPredicate),
            "invalid_predicate"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::DuplicateKey),
            "duplicate_key"
        );
        assert_eq!(
            format!("{}", RepositoryErrorKind::StoreUnavailable),
            "store_unavailable"
        );
    }

    #[test]
    fn test_not_found_carries_entity() {
        let error =
            RepositoryError::not_found(RepositoryOperation::UpdateByPrimaryKey, "Partition", 7);
        assert_eq!(error.operation, RepositoryOperation::UpdateByPrimaryKey);
        assert_eq!(error.entity_type.as_deref(), Some("Partition"));
        assert_eq!(error.entity_id.as_deref(), Some("7"));
        assert!(error.to_string().ends_with("[Partition: 7]"));
    }

    #[test]
    fn test_is_retriable() {
        let unavailable = RepositoryError::new(
            RepositoryOperation::CountByExample,
            RepositoryErrorKind::StoreUnavailable,
            "connection reset",
        );
        assert!(unavailable.is_retriable());
        assert!(!RepositoryError::invalid_predicate("bad").is_retriable());
        assert!(!RepositoryError::invalid_ordering("bad").is_retriable());
        assert!(
            !RepositoryError::validation_failed(RepositoryOperation::Insert, "bad").is_retriable()
        );
    }

    #[test]
    fn test_from_store_error() {
        let err: RepositoryError = StoreError::unique_violation(StoreOperation::Apply, "key 4 exists").into();
        assert_eq!(err.kind, RepositoryErrorKind::DuplicateKey);

        let err: RepositoryError = StoreError::unavailable(StoreOperation::Select, "store offline").into();
        assert_eq!(err.kind, RepositoryErrorKind::StoreUnavailable);
        assert!(err.is_retriable());

        let err: RepositoryError = StoreError::query_failed(StoreOperation::Count, "syntax").into();
        assert_eq!(err.kind, RepositoryErrorKind::StoreError);
        assert!(err.message.contains("syntax"));
    }

    #[test]
    fn test_error_is_error_trait() {
        let error: Box<dyn std::error::Error> =
            Box::new(RepositoryError::invalid_ordering("unknown sort field"));
        assert!(error.to_string().contains("invalid_ordering"));
    }
}

//! Store error types
//!
//! Structured errors raised by [`Store`](super::Store) implementations. The
//! pipeline maps a `NotFound` kind to a plain 404 and converts every other kind
//! into [`Error::Store`](crate::Error::Store), whose HTTP status follows the
//! kind.
//!
//! # Example
//!
//! ```rust
//! use acton_resource::store::{StoreError, StoreErrorKind};
//!
//! let error = StoreError::not_found("book", "42");
//! assert!(matches!(error.kind, StoreErrorKind::NotFound));
//! assert_eq!(error.to_string(), "Store not_found error during get: Record not found [book: 42]");
//! ```

use std::fmt;

/// Store call that was running when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Materializing or counting a collection
    Query,
    /// Fetching a single record by constraints
    Get,
    /// Inserting a new record
    Create,
    /// Updating or upserting a record
    Update,
    /// Removing a record
    Delete,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// No record matched
    NotFound,
    /// A record with the same identity exists
    AlreadyExists,
    /// Backend constraint rejected the write
    ConstraintViolation,
    /// Backend refused the record's contents
    ValidationFailed,
    /// Backend unreachable or timed out
    Unavailable,
    /// Anything else
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured store error with operation and record context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The store call that failed
    pub operation: StoreOperation,
    /// The category of error
    pub kind: StoreErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Record type involved, as reported by the store
    pub entity_type: Option<String>,
    /// Identity of the record involved
    pub entity_id: Option<String>,
}

impl StoreError {
    /// Create a new store error
    pub fn new(operation: StoreOperation, kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
        }
    }

    /// No record of `entity_type` has identity `entity_id`
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(StoreOperation::Get, StoreErrorKind::NotFound, "Record not found")
            .with_entity(entity_type, entity_id)
    }

    /// A record of `entity_type` with identity `entity_id` already exists
    pub fn already_exists(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            StoreOperation::Create,
            StoreErrorKind::AlreadyExists,
            "Record already exists",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Backend constraint violation
    pub fn constraint_violation(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::ConstraintViolation, message)
    }

    /// Backend unreachable
    pub fn unavailable(operation: StoreOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StoreErrorKind::Unavailable, message)
    }

    /// Add record context to an existing error
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
    pub fn with_operation(mut self, operation: StoreOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the same call may succeed if repeated
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Unavailable)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Store {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_entity() {
        let err = StoreError::unavailable(StoreOperation::Query, "pool closed");
        assert_eq!(err.to_string(), "Store unavailable error during query: pool closed");
        assert!(err.is_retriable());
    }

    #[test]
    fn test_with_operation_overrides_default() {
        let err = StoreError::not_found("book", "7").with_operation(StoreOperation::Update);
        assert_eq!(err.operation, StoreOperation::Update);
        assert_eq!(err.entity_id.as_deref(), Some("7"));
        assert!(!err.is_retriable());
    }
}

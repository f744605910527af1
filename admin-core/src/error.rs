//! Error types for resource operations
//!
//! This module defines the error taxonomy shared by every resource service,
//! controller, registry and the RBAC engine built on top of them.

use thiserror::Error;

use crate::store::StoreError;

/// Admin error types.
///
/// These errors cover validation, lookup, registration-time contract checks,
/// authorization decisions and persistence failures.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Bad pagination, sort, filter, id or bulk input.
    #[error("{message}")]
    InvalidArgument {
        /// Field the error refers to, if any.
        field: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// A role, permission, record or registered service does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with itself or with stored state (e.g. duplicate bulk id).
    #[error("{0}")]
    Conflict(String),

    /// Actor lacks the permission required for an action.
    #[error("Forbidden: missing permission {permission}")]
    Forbidden {
        /// The permission slug that was required.
        permission: String,
    },

    /// Candidate registered without the full required operation surface.
    #[error("{name} does not satisfy its contract, missing operations: {}", .missing.join(", "))]
    ContractViolation {
        /// Registration name.
        name: String,
        /// Every missing operation name.
        missing: Vec<String>,
    },

    /// A transactional operation failed and was rolled back.
    #[error("Transaction rolled back: {0}")]
    TransactionFailure(String),

    /// A sequential multi-step operation failed part-way through.
    #[error("{succeeded} of {total} succeeded: {source}")]
    PartialFailure {
        /// Items processed before the failure.
        succeeded: usize,
        /// Items requested.
        total: usize,
        /// The failure that stopped the loop.
        #[source]
        source: Box<AdminError>,
    },

    /// Persistence collaborator failure.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for admin operations.
pub type AdminResult<T> = Result<T, AdminError>;

impl From<StoreError> for AdminError {
    /// Constraint and lookup failures keep their meaning; everything else
    /// is a persistence failure.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { .. } => AdminError::Conflict(err.to_string()),
            StoreError::NotFound { .. } => AdminError::NotFound(err.to_string()),
            other => AdminError::Store(other),
        }
    }
}

impl AdminError {
    /// Create an `InvalidArgument` error without a field.
    pub fn invalid(message: impl Into<String>) -> Self {
        AdminError::InvalidArgument {
            field: None,
            message: message.into(),
        }
    }

    /// Create an `InvalidArgument` error for a specific field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AdminError::InvalidArgument {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Wrap an `InvalidArgument` so that its message names `field`.
    ///
    /// Other variants are returned unchanged.
    pub fn in_field(self, field: &str) -> Self {
        match self {
            AdminError::InvalidArgument { message, .. } => AdminError::InvalidArgument {
                field: Some(field.to_string()),
                message: format!("invalid {}: {}", field, message),
            },
            other => other,
        }
    }

    /// Create a `NotFound` error using the standard resource phrasing.
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        AdminError::NotFound(format!("{} with ID {} not found", resource, id))
    }

    /// Wrap a mid-loop failure as "N of M succeeded".
    pub fn partial(succeeded: usize, total: usize, source: AdminError) -> Self {
        AdminError::PartialFailure {
            succeeded,
            total,
            source: Box::new(source),
        }
    }

    /// The field an `InvalidArgument` refers to.
    pub fn field(&self) -> Option<&str> {
        match self {
            AdminError::InvalidArgument { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Check if this error should be logged at error level.
    ///
    /// Validation and lookup failures are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AdminError::Store(_) | AdminError::Internal(_) | AdminError::TransactionFailure(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::InvalidArgument { .. } => 400,
            AdminError::Conflict(_) => 409,
            AdminError::Forbidden { .. } => 403,
            AdminError::NotFound(_) => 404,
            AdminError::PartialFailure { .. } => 207,

            AdminError::ContractViolation { .. }
            | AdminError::TransactionFailure(_)
            | AdminError::Store(_)
            | AdminError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AdminError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            AdminError::NotFound(_) => "NOT_FOUND",
            AdminError::Conflict(_) => "CONFLICT",
            AdminError::Forbidden { .. } => "FORBIDDEN",
            AdminError::ContractViolation { .. } => "CONTRACT_VIOLATION",
            AdminError::TransactionFailure(_) => "TRANSACTION_FAILURE",
            AdminError::PartialFailure { .. } => "PARTIAL_FAILURE",
            AdminError::Store(_) => "STORE_ERROR",
            AdminError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_field_wraps_invalid_argument() {
        let err = AdminError::invalid("page must be greater than 0").in_field("page");
        assert_eq!(err.field(), Some("page"));
        assert_eq!(err.to_string(), "invalid page: page must be greater than 0");
    }

    #[test]
    fn test_in_field_leaves_other_variants() {
        let err = AdminError::NotFound("missing".to_string()).in_field("page");
        assert!(matches!(err, AdminError::NotFound(_)));
    }

    #[test]
    fn test_contract_violation_lists_every_operation() {
        let err = AdminError::ContractViolation {
            name: "books".to_string(),
            missing: vec!["sortable_fields".to_string(), "validate_sort".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "books does not satisfy its contract, missing operations: sortable_fields, validate_sort"
        );
    }

    #[test]
    fn test_partial_failure_message() {
        let err = AdminError::partial(2, 5, AdminError::not_found("Book", 9));
        assert_eq!(err.to_string(), "2 of 5 succeeded: Book with ID 9 not found");
        assert_eq!(err.status_code(), 207);
    }

    #[test]
    fn test_store_error_mapping() {
        let err: AdminError = StoreError::UniqueViolation {
            table: "roles".into(),
            field: "slug".into(),
            value: "\"admin\"".into(),
        }
        .into();
        assert!(matches!(err, AdminError::Conflict(_)));

        let err: AdminError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, AdminError::Store(_)));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AdminError::invalid("x").status_code(), 400);
        assert_eq!(AdminError::Conflict("x".into()).status_code(), 409);
        assert_eq!(
            AdminError::Forbidden {
                permission: "books.delete".into()
            }
            .status_code(),
            403
        );
        assert!(AdminError::TransactionFailure("x".into()).is_server_error());
        assert!(!AdminError::invalid("x").is_server_error());
    }
}

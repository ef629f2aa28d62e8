//! Service-level errors.
//!
//! Every operation on [`crate::service::AuthzService`] returns
//! [`ServiceError`]: a stable [`ErrorKind`], a machine-readable code and a
//! message safe to show to callers. Internal details are logged, not
//! returned.

use relgraph_domain::{DomainError, ErrorKind};
use relgraph_storage::StorageError;
use tracing::error;

/// Machine-readable error codes.
pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const STORE_ID_NOT_FOUND: &str = "store_id_not_found";
    pub const AUTHORIZATION_MODEL_NOT_FOUND: &str = "authorization_model_not_found";
    pub const LATEST_AUTHORIZATION_MODEL_NOT_FOUND: &str = "latest_authorization_model_not_found";
    pub const TYPE_NOT_FOUND: &str = "type_not_found";
    pub const RELATION_NOT_FOUND: &str = "relation_not_found";
    pub const RESOLUTION_TOO_COMPLEX: &str = "authorization_model_resolution_too_complex";
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
    pub const CANCELLED: &str = "cancelled";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Error returned by the service layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, error_codes::VALIDATION_ERROR, message)
    }

    /// Creates a store not found error.
    pub fn store_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, error_codes::STORE_ID_NOT_FOUND, message)
    }

    /// Creates an authorization model not found error.
    pub fn authorization_model_not_found(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotFound,
            error_codes::AUTHORIZATION_MODEL_NOT_FOUND,
            message,
        )
    }

    /// Creates an error for a store that has no model yet.
    pub fn latest_authorization_model_not_found(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotFound,
            error_codes::LATEST_AUTHORIZATION_MODEL_NOT_FOUND,
            message,
        )
    }

    /// Creates a schema error for a type missing from the model.
    pub fn type_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, error_codes::TYPE_NOT_FOUND, message)
    }

    /// Creates a schema error for a relation missing from the model.
    pub fn relation_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, error_codes::RELATION_NOT_FOUND, message)
    }

    /// Creates a resolution too complex error.
    pub fn resolution_too_complex(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ResolutionTooComplex,
            error_codes::RESOLUTION_TOO_COMPLEX,
            message,
        )
    }

    /// Creates a deadline exceeded error.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DeadlineExceeded,
            error_codes::DEADLINE_EXCEEDED,
            message,
        )
    }

    /// Creates a cancelled error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, error_codes::CANCELLED, message)
    }

    /// Creates an internal error.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, error_codes::INTERNAL_ERROR, message)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StoreNotFound { store_id } => {
                ServiceError::store_not_found(format!("store not found: {store_id}"))
            }
            StorageError::ModelNotFound { model_id } => ServiceError::authorization_model_not_found(
                format!("authorization model not found: {model_id}"),
            ),
            StorageError::InvalidInput { message } | StorageError::InvalidFilter { message } => {
                ServiceError::validation_error(message)
            }
            other @ (StorageError::StoreAlreadyExists { .. }
            | StorageError::InternalError { .. }) => {
                error!("Storage error: {}", other);
                ServiceError::internal_error("storage operation failed")
            }
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::StoreNotFound { .. } => ServiceError::store_not_found(err.to_string()),
            DomainError::AuthorizationModelNotFound { model_id } if model_id == "latest" => {
                ServiceError::latest_authorization_model_not_found(
                    "no authorization model found for store",
                )
            }
            DomainError::AuthorizationModelNotFound { .. } => {
                ServiceError::authorization_model_not_found(err.to_string())
            }
            DomainError::TypeNotFound { .. } => ServiceError::type_not_found(err.to_string()),
            DomainError::RelationNotFound { .. } => {
                ServiceError::relation_not_found(err.to_string())
            }
            DomainError::DepthLimitExceeded { .. } => {
                ServiceError::resolution_too_complex(err.to_string())
            }
            DomainError::Timeout { .. } => ServiceError::deadline_exceeded(err.to_string()),
            DomainError::Cancelled => ServiceError::cancelled(err.to_string()),
            DomainError::StorageOperationFailed { reason } => {
                error!("Storage operation failed: {}", reason);
                ServiceError::internal_error("storage operation failed")
            }
            DomainError::ModelParseError { .. }
            | DomainError::ModelValidationError { .. }
            | DomainError::InvalidTuple { .. }
            | DomainError::InvalidUserFormat { .. }
            | DomainError::InvalidObjectFormat { .. }
            | DomainError::InvalidRelationFormat { .. } => {
                ServiceError::validation_error(err.to_string())
            }
        }
    }
}

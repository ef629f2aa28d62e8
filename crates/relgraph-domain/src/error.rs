//! Domain error types for authorization operations.

use thiserror::Error;

/// Domain-specific errors for authorization operations.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Error decoding an authorization model document.
    #[error("model parse error: {message}")]
    ModelParseError { message: String },

    /// Error validating authorization model.
    #[error("model validation error: {message}")]
    ModelValidationError { message: String },

    /// A tuple is not allowed by the authorization model.
    #[error("invalid tuple '{tuple}': {reason}")]
    InvalidTuple { tuple: String, reason: String },

    /// Depth limit exceeded during graph traversal.
    #[error("depth limit exceeded (max: {max_depth})")]
    DepthLimitExceeded { max_depth: u32 },

    /// Timeout during permission check.
    #[error("timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid user format.
    #[error("invalid user format: {value}")]
    InvalidUserFormat { value: String },

    /// Invalid object format.
    #[error("invalid object format: {value}")]
    InvalidObjectFormat { value: String },

    /// Invalid relation format.
    #[error("invalid relation format: {value}")]
    InvalidRelationFormat { value: String },

    /// Type not found in authorization model.
    #[error("type not found: {type_name}")]
    TypeNotFound { type_name: String },

    /// Relation not found on type.
    #[error("relation '{relation}' not found on type '{type_name}'")]
    RelationNotFound { type_name: String, relation: String },

    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Authorization model not found in a store.
    #[error("authorization model not found: {model_id}")]
    AuthorizationModelNotFound { model_id: String },

    /// The backing store failed.
    #[error("storage operation failed: {reason}")]
    StorageOperationFailed { reason: String },
}

/// Coarse classification of a [`DomainError`], used by callers to pick a
/// response without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request or a model/tuple in it is malformed or disallowed.
    Validation,
    /// A referenced store or model does not exist.
    NotFound,
    /// A relation expression references something the model lacks.
    Schema,
    /// Resolution exceeded the traversal depth bound.
    ResolutionTooComplex,
    /// Resolution ran past its deadline.
    DeadlineExceeded,
    /// The caller cancelled resolution.
    Cancelled,
    /// Unexpected failure in a collaborator.
    Internal,
}

impl DomainError {
    /// Returns the kind of this error.
    ///
    /// `TypeNotFound` and `RelationNotFound` are schema errors here; the
    /// resolver converts them to validation errors when they come from the
    /// request itself rather than from a relation expression.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::ModelParseError { .. }
            | DomainError::ModelValidationError { .. }
            | DomainError::InvalidTuple { .. }
            | DomainError::InvalidUserFormat { .. }
            | DomainError::InvalidObjectFormat { .. }
            | DomainError::InvalidRelationFormat { .. } => ErrorKind::Validation,
            DomainError::TypeNotFound { .. } | DomainError::RelationNotFound { .. } => {
                ErrorKind::Schema
            }
            DomainError::StoreNotFound { .. } | DomainError::AuthorizationModelNotFound { .. } => {
                ErrorKind::NotFound
            }
            DomainError::DepthLimitExceeded { .. } => ErrorKind::ResolutionTooComplex,
            DomainError::Timeout { .. } => ErrorKind::DeadlineExceeded,
            DomainError::Cancelled => ErrorKind::Cancelled,
            DomainError::StorageOperationFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Whether this error only ends the current traversal path.
    ///
    /// Any-of evaluation treats such a branch as "not granted" as long as
    /// another branch produced a definite answer.
    pub fn is_path_termination(&self) -> bool {
        matches!(self, DomainError::DepthLimitExceeded { .. })
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_classified() {
        let err = DomainError::ModelValidationError {
            message: "empty".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = DomainError::RelationNotFound {
            type_name: "document".to_string(),
            relation: "viewer".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = DomainError::AuthorizationModelNotFound {
            model_id: "01H".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(DomainError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_only_depth_limit_terminates_a_path() {
        assert!(DomainError::DepthLimitExceeded { max_depth: 25 }.is_path_termination());
        assert!(!DomainError::Timeout { duration_ms: 10 }.is_path_termination());
        assert!(!DomainError::Cancelled.is_path_termination());
    }

    #[test]
    fn test_error_messages() {
        let err = DomainError::RelationNotFound {
            type_name: "team".to_string(),
            relation: "member".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "relation 'member' not found on type 'team'"
        );
    }
}

//! Types for the graph resolver.

use std::time::Duration;

use crate::model::WILDCARD;

use super::cancellation::CancellationToken;

/// Request for a permission check.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// The store ID to check against.
    pub store_id: String,
    /// The user identifier (e.g., "user:alice").
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object identifier (e.g., "document:readme").
    pub object: String,
    /// Optional authorization model ID to use for the check.
    /// If not provided, the latest model for the store is used.
    pub authorization_model_id: Option<String>,
    /// Overrides the resolver's configured timeout for this check.
    pub timeout: Option<Duration>,
    /// Lets the caller abandon the check while it is running.
    pub cancellation: Option<CancellationToken>,
}

impl CheckRequest {
    /// Creates a new CheckRequest against the store's latest model.
    pub fn new(
        store_id: impl Into<String>,
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
            authorization_model_id: None,
            timeout: None,
            cancellation: None,
        }
    }

    /// Pins the check to a specific authorization model.
    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }

    /// Sets a per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether the check is allowed.
    pub allowed: bool,
}

/// Reference to a stored tuple for resolver use.
///
/// Only the subject is carried; the object and relation are implied by the
/// lookup that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTupleRef {
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTupleRef {
    /// Creates a new StoredTupleRef.
    pub fn new(
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// Whether the subject is a `type:*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.user_id == WILDCARD
    }
}

// ============================================================
// ListObjects / ListUsers API Types
// ============================================================

/// Request for listing objects accessible to a user.
#[derive(Debug, Clone)]
pub struct ListObjectsRequest {
    /// The store ID to query.
    pub store_id: String,
    /// The user to check permissions for.
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object type to list (e.g., "document").
    pub object_type: String,
    /// Optional authorization model ID; latest when absent.
    pub authorization_model_id: Option<String>,
    /// Upper bound on returned objects.
    pub max_results: Option<usize>,
}

impl ListObjectsRequest {
    /// Creates a new ListObjectsRequest against the latest model.
    pub fn new(
        store_id: impl Into<String>,
        user: impl Into<String>,
        relation: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            user: user.into(),
            relation: relation.into(),
            object_type: object_type.into(),
            authorization_model_id: None,
            max_results: None,
        }
    }
}

/// Result of listing objects accessible to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsResult {
    /// Accessible objects in `type:id` form, sorted.
    pub objects: Vec<String>,
    /// Whether `max_results` cut the list short.
    pub truncated: bool,
}

/// Request for listing subjects that hold a relation on an object.
#[derive(Debug, Clone)]
pub struct ListUsersRequest {
    /// The store ID to query.
    pub store_id: String,
    /// The object identifier (e.g., "document:doc-001").
    pub object: String,
    /// The relation to check.
    pub relation: String,
    /// Subject type to list (e.g., "team").
    pub user_type: String,
    /// When set, list `type:id#relation` usersets instead of plain subjects.
    pub user_relation: Option<String>,
    /// Optional authorization model ID; latest when absent.
    pub authorization_model_id: Option<String>,
}

impl ListUsersRequest {
    /// Creates a new ListUsersRequest against the latest model.
    pub fn new(
        store_id: impl Into<String>,
        object: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            object: object.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_relation: None,
            authorization_model_id: None,
        }
    }

    /// Lists `user_type:id#user_relation` usersets.
    pub fn with_user_relation(mut self, user_relation: impl Into<String>) -> Self {
        self.user_relation = Some(user_relation.into());
        self
    }
}

/// Result of listing subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersResult {
    /// Matching subjects, sorted.
    pub users: Vec<String>,
}

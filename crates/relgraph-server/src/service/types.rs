//! Request and response types for service operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relgraph_domain::model::{AuthorizationModel, Tuple};
use relgraph_domain::resolver::CancellationToken;
use relgraph_storage::{Store, StoredTuple};

/// A relationship in its external `(user, relation, object)` form.
pub type TupleKey = Tuple;

/// Store metadata returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Store> for StoreResponse {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            name: store.name,
            created_at: store.created_at,
            updated_at: store.updated_at,
        }
    }
}

/// Response to publishing a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAuthorizationModelResponse {
    pub authorization_model_id: String,
}

/// A published model together with its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationModelResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub model: AuthorizationModel,
}

/// A batch of tuple writes and deletes, applied atomically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Model the tuples are validated against; latest when absent.
    #[serde(default)]
    pub authorization_model_id: Option<String>,
    #[serde(default)]
    pub writes: Vec<TupleKey>,
    #[serde(default)]
    pub deletes: Vec<TupleKey>,
}

impl WriteRequest {
    pub fn writes(writes: Vec<TupleKey>) -> Self {
        Self {
            writes,
            ..Default::default()
        }
    }

    pub fn deletes(deletes: Vec<TupleKey>) -> Self {
        Self {
            deletes,
            ..Default::default()
        }
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }
}

/// Tuple query. Every field is optional; `object` may be `type:` to match
/// every object of a type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
}

pub(crate) fn to_tuple_key(tuple: &StoredTuple) -> TupleKey {
    TupleKey::new(tuple.user(), tuple.relation.clone(), tuple.object())
}

/// Parameters of a permission check.
#[derive(Debug, Clone)]
pub struct CheckParams {
    pub tuple_key: TupleKey,
    /// Model to evaluate against; latest when absent.
    pub authorization_model_id: Option<String>,
    /// Overrides `resolver.timeout_ms` for this check.
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl CheckParams {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            tuple_key: TupleKey::new(user, relation, object),
            authorization_model_id: None,
            timeout: None,
            cancellation: None,
        }
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// Parameters of a ListObjects query.
#[derive(Debug, Clone)]
pub struct ListObjectsParams {
    pub user: String,
    pub relation: String,
    pub object_type: String,
    pub authorization_model_id: Option<String>,
}

impl ListObjectsParams {
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object_type: object_type.into(),
            authorization_model_id: None,
        }
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }
}

/// Objects a user holds a relation on, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<String>,
    /// Set when `limits.max_list_objects` cut the list short.
    #[serde(default)]
    pub truncated: bool,
}

/// Parameters of a ListUsers query.
#[derive(Debug, Clone)]
pub struct ListUsersParams {
    pub object: String,
    pub relation: String,
    pub user_type: String,
    /// List `user_type:id#user_relation` usersets instead of plain subjects.
    pub user_relation: Option<String>,
    pub authorization_model_id: Option<String>,
}

impl ListUsersParams {
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_relation: None,
            authorization_model_id: None,
        }
    }

    pub fn with_user_relation(mut self, user_relation: impl Into<String>) -> Self {
        self.user_relation = Some(user_relation.into());
        self
    }

    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = Some(authorization_model_id.into());
        self
    }
}

/// Subjects holding a relation on an object, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub users: Vec<String>,
}

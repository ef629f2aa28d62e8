//! DataStore trait definition.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Maximum length of a store id or name.
pub const MAX_STORE_FIELD_LENGTH: usize = 256;

/// Maximum length of any single tuple component.
pub const MAX_TUPLE_FIELD_LENGTH: usize = 512;

/// Filter for reading tuples.
///
/// Every set field must match. `user` is `type:id`, `type:id#relation` or
/// `type:*`.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
    /// Filter by object type.
    pub object_type: Option<String>,
    /// Filter by object ID. Requires `object_type`.
    pub object_id: Option<String>,
    /// Filter by relation.
    pub relation: Option<String>,
    /// Filter by user.
    pub user: Option<String>,
}

/// A stored tuple, decomposed into its object, relation and subject parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoredTuple {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTuple {
    /// Creates a new stored tuple.
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// The subject in `type:id` or `type:id#relation` form.
    pub fn user(&self) -> String {
        match &self.user_relation {
            Some(relation) => format!("{}:{}#{}", self.user_type, self.user_id, relation),
            None => format!("{}:{}", self.user_type, self.user_id),
        }
    }

    /// The object in `type:id` form.
    pub fn object(&self) -> String {
        format!("{}:{}", self.object_type, self.object_id)
    }
}

/// Store metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A published authorization model in its canonical JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuthorizationModel {
    pub id: String,
    pub store_id: String,
    pub schema_version: String,
    /// Canonical JSON of the full model document.
    pub model_json: String,
    pub created_at: DateTime<Utc>,
}

impl StoredAuthorizationModel {
    /// Creates a model record stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        store_id: impl Into<String>,
        schema_version: impl Into<String>,
        model_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            store_id: store_id.into(),
            schema_version: schema_version.into(),
            model_json: model_json.into(),
            created_at: Utc::now(),
        }
    }
}

/// A read-only view of one store's tuples as of the moment it was taken.
///
/// Batches committed afterwards are not visible through it, so any number
/// of lookups against one snapshot observe a single committed state.
pub trait TupleSnapshot: Send + Sync {
    /// Tuples on one object, optionally restricted to a relation, sorted.
    fn read_tuples_by_object(
        &self,
        object_type: &str,
        object_id: &str,
        relation: Option<&str>,
    ) -> Vec<StoredTuple>;

    /// Distinct ids of objects of `object_type`, sorted.
    fn list_objects_by_type(&self, object_type: &str) -> Vec<String>;

    /// Distinct subjects of `user_type`, sorted; see
    /// [`DataStore::list_users_by_type`].
    fn list_users_by_type(&self, user_type: &str, user_relation: Option<&str>) -> Vec<String>;
}

/// Abstract storage interface for authorization data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. A `write_tuples` batch must be visible to readers
/// either entirely or not at all.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Store operations

    /// Creates a new store.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by ID.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Deletes a store together with its tuples and models.
    async fn delete_store(&self, id: &str) -> StorageResult<()>;

    /// Lists all stores, oldest first.
    async fn list_stores(&self) -> StorageResult<Vec<Store>>;

    // Tuple operations

    /// Applies `deletes` then `writes` as one atomic batch.
    ///
    /// Writing an existing tuple and deleting an absent one are no-ops.
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()>;

    /// Writes a single tuple.
    async fn write_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(store_id, vec![tuple], Vec::new()).await
    }

    /// Deletes a single tuple.
    async fn delete_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        self.write_tuples(store_id, Vec::new(), vec![tuple]).await
    }

    /// Reads tuples matching the filter, sorted.
    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>>;

    /// Reads tuples on one object, optionally restricted to a relation.
    async fn read_tuples_by_object(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>>;

    /// Reads tuples whose subject is `user`, optionally restricted to a
    /// relation.
    async fn read_tuples_by_user(
        &self,
        store_id: &str,
        user: &str,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>>;

    /// Lists distinct ids of objects of `object_type` that appear in any
    /// tuple, sorted.
    async fn list_objects_by_type(
        &self,
        store_id: &str,
        object_type: &str,
    ) -> StorageResult<Vec<String>>;

    /// Lists distinct subjects of `user_type` appearing in any tuple,
    /// sorted. With `user_relation` only `type:id#user_relation` usersets
    /// are returned, otherwise only subjects without a relation.
    async fn list_users_by_type(
        &self,
        store_id: &str,
        user_type: &str,
        user_relation: Option<&str>,
    ) -> StorageResult<Vec<String>>;

    /// Pins the store's current tuples. Multi-step readers such as a
    /// permission check resolve every lookup against one snapshot.
    async fn snapshot(&self, store_id: &str) -> StorageResult<Arc<dyn TupleSnapshot>>;

    // Authorization model operations

    /// Appends a published model to its store.
    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Gets a model by id.
    async fn get_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;

    /// Lists models, newest first.
    async fn list_authorization_models(
        &self,
        store_id: &str,
    ) -> StorageResult<Vec<StoredAuthorizationModel>>;

    /// Gets the most recently published model.
    async fn get_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> StorageResult<StoredAuthorizationModel>;
}

/// Validates a store id.
pub fn validate_store_id(id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::InvalidInput {
            message: "store id cannot be empty".to_string(),
        });
    }
    if id.len() > MAX_STORE_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("store id exceeds {MAX_STORE_FIELD_LENGTH} characters"),
        });
    }
    Ok(())
}

/// Validates a store name.
pub fn validate_store_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidInput {
            message: "store name cannot be empty".to_string(),
        });
    }
    if name.len() > MAX_STORE_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("store name exceeds {MAX_STORE_FIELD_LENGTH} characters"),
        });
    }
    Ok(())
}

/// Validates that every tuple component is present and bounded.
pub fn validate_tuple(tuple: &StoredTuple) -> StorageResult<()> {
    let fields = [
        ("object_type", Some(tuple.object_type.as_str())),
        ("object_id", Some(tuple.object_id.as_str())),
        ("relation", Some(tuple.relation.as_str())),
        ("user_type", Some(tuple.user_type.as_str())),
        ("user_id", Some(tuple.user_id.as_str())),
        ("user_relation", tuple.user_relation.as_deref()),
    ];
    for (field, value) in fields {
        let Some(value) = value else { continue };
        if value.is_empty() {
            return Err(StorageError::InvalidInput {
                message: format!("{field} cannot be empty"),
            });
        }
        if value.len() > MAX_TUPLE_FIELD_LENGTH {
            return Err(StorageError::InvalidInput {
                message: format!("{field} exceeds {MAX_TUPLE_FIELD_LENGTH} characters"),
            });
        }
    }
    Ok(())
}

/// Parses a subject filter into `(user_type, user_id, user_relation)`.
pub fn parse_user_filter(user: &str) -> StorageResult<(String, String, Option<String>)> {
    let invalid = || StorageError::InvalidFilter {
        message: format!("user filter must be type:id or type:id#relation, got '{user}'"),
    };
    let (user_type, rest) = user.split_once(':').ok_or_else(invalid)?;
    let (user_id, user_relation) = match rest.split_once('#') {
        Some((id, relation)) => (id, Some(relation)),
        None => (rest, None),
    };
    if user_type.is_empty() || user_id.is_empty() || user_relation.is_some_and(str::is_empty) {
        return Err(invalid());
    }
    Ok((
        user_type.to_string(),
        user_id.to_string(),
        user_relation.map(str::to_string),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_tuple_formats_subject_and_object() {
        let tuple = StoredTuple::new(
            "document",
            "doc-001",
            "editor",
            "team",
            "engineering",
            Some("member".to_string()),
        );
        assert_eq!(tuple.user(), "team:engineering#member");
        assert_eq!(tuple.object(), "document:doc-001");
    }

    #[test]
    fn test_parse_user_filter() {
        assert_eq!(
            parse_user_filter("user:alice").unwrap(),
            ("user".to_string(), "alice".to_string(), None)
        );
        assert_eq!(
            parse_user_filter("team:eng#member").unwrap(),
            ("team".to_string(), "eng".to_string(), Some("member".to_string()))
        );
        assert_eq!(
            parse_user_filter("user:*").unwrap(),
            ("user".to_string(), "*".to_string(), None)
        );

        for invalid in ["alice", ":alice", "user:", "team:eng#"] {
            assert!(
                matches!(parse_user_filter(invalid), Err(StorageError::InvalidFilter { .. })),
                "'{invalid}' should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_tuple_rejects_empty_and_oversized_fields() {
        let mut tuple = StoredTuple::new("document", "doc1", "viewer", "user", "alice", None);
        assert!(validate_tuple(&tuple).is_ok());

        tuple.user_relation = Some(String::new());
        assert!(validate_tuple(&tuple).is_err());

        tuple.user_relation = None;
        tuple.object_id = "x".repeat(MAX_TUPLE_FIELD_LENGTH + 1);
        assert!(validate_tuple(&tuple).is_err());
    }

    #[test]
    fn test_validate_store_fields() {
        assert!(validate_store_id("01HSTORE").is_ok());
        assert!(validate_store_id("").is_err());
        assert!(validate_store_name("  ").is_err());
        assert!(validate_store_name(&"n".repeat(MAX_STORE_FIELD_LENGTH + 1)).is_err());
    }
}

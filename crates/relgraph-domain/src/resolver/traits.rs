//! Traits for storage operations needed by the resolver.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::model::TypeSystem;

use super::types::StoredTupleRef;

/// Trait for tuple storage operations needed by the resolver.
#[async_trait]
pub trait TupleReader: Send + Sync {
    /// Reads the subjects of tuples on `object_type:object_id#relation`.
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>>;

    /// Checks if a store exists.
    async fn store_exists(&self, store_id: &str) -> DomainResult<bool>;

    /// Lists all unique object IDs of a given type that have any tuples.
    ///
    /// Default implementation returns an empty list. Override for
    /// ListObjects support.
    async fn list_objects_by_type(
        &self,
        _store_id: &str,
        _object_type: &str,
    ) -> DomainResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Lists distinct subjects of `user_type` appearing in any tuple,
    /// restricted to `type:id#user_relation` usersets when a relation is
    /// given.
    ///
    /// Default implementation returns an empty list. Override for
    /// ListUsers support.
    async fn list_users_by_type(
        &self,
        _store_id: &str,
        _user_type: &str,
        _user_relation: Option<&str>,
    ) -> DomainResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Trait for authorization model operations needed by the resolver.
#[async_trait]
pub trait ModelReader: Send + Sync {
    /// Gets a model of a store: the given one, or the latest when `model_id`
    /// is `None`.
    ///
    /// Fails with `DomainError::AuthorizationModelNotFound` when the store
    /// has no such model.
    async fn get_model(
        &self,
        store_id: &str,
        model_id: Option<&str>,
    ) -> DomainResult<Arc<TypeSystem>>;
}

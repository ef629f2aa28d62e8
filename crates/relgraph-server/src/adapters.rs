//! Adapters that bridge storage layer to domain layer.
//!
//! The domain layer (relgraph-domain) defines abstract traits for data access:
//! - `TupleReader`: Read tuples for authorization checks
//! - `ModelReader`: Read authorization models
//!
//! The storage layer (relgraph-storage) implements `DataStore`. The adapters
//! here implement the domain traits on top of any `DataStore`: tuples are
//! read from a snapshot pinned per request, models through a parse cache.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use relgraph_domain::error::{DomainError, DomainResult};
use relgraph_domain::model::{parse_model, TypeSystem};
use relgraph_domain::resolver::{ModelReader, StoredTupleRef, TupleReader};
use relgraph_storage::{DataStore, StorageError, TupleSnapshot};

/// Maps a storage failure into the domain's error space.
fn storage_to_domain(err: StorageError) -> DomainError {
    match err {
        StorageError::StoreNotFound { store_id } => DomainError::StoreNotFound { store_id },
        StorageError::ModelNotFound { model_id } => {
            DomainError::AuthorizationModelNotFound { model_id }
        }
        other => DomainError::StorageOperationFailed {
            reason: other.to_string(),
        },
    }
}

/// Adapter that implements `TupleReader` over one pinned snapshot of a
/// store's tuples.
///
/// A reader is built per check or list query; every lookup it serves comes
/// from the same committed state, so a concurrent batch is seen entirely or
/// not at all.
pub struct SnapshotTupleReader {
    store_id: String,
    /// `None` when the store did not exist at pin time.
    snapshot: Option<Arc<dyn TupleSnapshot>>,
}

impl SnapshotTupleReader {
    /// Pins the current tuples of `store_id`. A missing store yields a
    /// reader that reports it as absent.
    pub async fn pin<S: DataStore>(storage: &S, store_id: &str) -> DomainResult<Self> {
        let snapshot = match storage.snapshot(store_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(StorageError::StoreNotFound { .. }) => None,
            Err(e) => return Err(storage_to_domain(e)),
        };
        Ok(Self {
            store_id: store_id.to_string(),
            snapshot,
        })
    }

    fn pinned(&self, store_id: &str) -> DomainResult<&dyn TupleSnapshot> {
        match &self.snapshot {
            Some(snapshot) if store_id == self.store_id => Ok(snapshot.as_ref()),
            _ => Err(DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl TupleReader for SnapshotTupleReader {
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> DomainResult<Vec<StoredTupleRef>> {
        let tuples = self
            .pinned(store_id)?
            .read_tuples_by_object(object_type, object_id, Some(relation));

        Ok(tuples
            .into_iter()
            .map(|t| StoredTupleRef::new(t.user_type, t.user_id, t.user_relation))
            .collect())
    }

    async fn store_exists(&self, store_id: &str) -> DomainResult<bool> {
        Ok(self.snapshot.is_some() && store_id == self.store_id)
    }

    async fn list_objects_by_type(
        &self,
        store_id: &str,
        object_type: &str,
    ) -> DomainResult<Vec<String>> {
        Ok(self.pinned(store_id)?.list_objects_by_type(object_type))
    }

    async fn list_users_by_type(
        &self,
        store_id: &str,
        user_type: &str,
        user_relation: Option<&str>,
    ) -> DomainResult<Vec<String>> {
        Ok(self
            .pinned(store_id)?
            .list_users_by_type(user_type, user_relation))
    }
}

/// Adapter that implements `ModelReader` using a `DataStore`.
///
/// Published models are immutable, so each one is parsed once and its
/// `TypeSystem` cached under `(store_id, model_id)`. Resolving "latest"
/// still asks storage which model is newest.
pub struct DataStoreModelReader<S: DataStore> {
    storage: Arc<S>,
    cache: DashMap<(String, String), Arc<TypeSystem>>,
}

impl<S: DataStore> DataStoreModelReader<S> {
    /// Creates a new adapter wrapping the given storage.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            cache: DashMap::new(),
        }
    }

    /// Drops every cached model of a store.
    pub fn evict_store(&self, store_id: &str) {
        self.cache.retain(|(cached_store, _), _| cached_store != store_id);
    }

    /// Number of cached models.
    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, store_id: &str, model_id: &str) -> Option<Arc<TypeSystem>> {
        self.cache
            .get(&(store_id.to_string(), model_id.to_string()))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, store_id: &str, model_id: &str, model_json: &str) -> DomainResult<Arc<TypeSystem>> {
        let model = parse_model(model_json)?;
        let type_system = Arc::new(TypeSystem::new(model));
        self.cache.insert(
            (store_id.to_string(), model_id.to_string()),
            Arc::clone(&type_system),
        );
        debug!(store_id, model_id, "cached authorization model");
        Ok(type_system)
    }
}

#[async_trait]
impl<S: DataStore> ModelReader for DataStoreModelReader<S> {
    async fn get_model(
        &self,
        store_id: &str,
        model_id: Option<&str>,
    ) -> DomainResult<Arc<TypeSystem>> {
        match model_id {
            Some(model_id) => {
                if let Some(model) = self.cached(store_id, model_id) {
                    return Ok(model);
                }
                let stored = self
                    .storage
                    .get_authorization_model(store_id, model_id)
                    .await
                    .map_err(storage_to_domain)?;
                self.insert(store_id, &stored.id, &stored.model_json)
            }
            None => {
                let stored = match self.storage.get_latest_authorization_model(store_id).await {
                    Ok(stored) => stored,
                    Err(StorageError::ModelNotFound { .. }) => {
                        return Err(DomainError::AuthorizationModelNotFound {
                            model_id: "latest".to_string(),
                        })
                    }
                    Err(e) => return Err(storage_to_domain(e)),
                };
                match self.cached(store_id, &stored.id) {
                    Some(model) => Ok(model),
                    None => self.insert(store_id, &stored.id, &stored.model_json),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use relgraph_domain::resolver::{CheckRequest, GraphResolver};
    use relgraph_storage::{MemoryDataStore, StoredAuthorizationModel, StoredTuple};

    const MODEL: &str = r#"{
        "schema_version": "1.1",
        "type_definitions": [
            {"type": "user"},
            {
                "type": "document",
                "relations": {"viewer": {"this": {}}},
                "metadata": {"relations": {"viewer": {"directly_related_user_types": [{"type": "user"}]}}}
            }
        ]
    }"#;

    async fn storage_with_store() -> Arc<MemoryDataStore> {
        let storage = Arc::new(MemoryDataStore::new());
        storage
            .create_store("test-store", "Test Store")
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_tuple_reader_adapter_store_exists() {
        let storage = storage_with_store().await;
        let reader = SnapshotTupleReader::pin(storage.as_ref(), "test-store")
            .await
            .unwrap();

        assert!(reader.store_exists("test-store").await.unwrap());
        assert!(!reader.store_exists("nonexistent").await.unwrap());

        let missing = SnapshotTupleReader::pin(storage.as_ref(), "nonexistent")
            .await
            .unwrap();
        assert!(!missing.store_exists("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_tuple_reader_adapter_read_tuples() {
        let storage = storage_with_store().await;
        storage
            .write_tuples(
                "test-store",
                vec![
                    StoredTuple::new("document", "readme", "viewer", "user", "alice", None),
                    StoredTuple::new("document", "readme", "owner", "user", "bob", None),
                ],
                vec![],
            )
            .await
            .unwrap();

        let reader = SnapshotTupleReader::pin(storage.as_ref(), "test-store")
            .await
            .unwrap();
        let tuples = reader
            .read_tuples("test-store", "document", "readme", "viewer")
            .await
            .unwrap();

        assert_eq!(tuples, vec![StoredTupleRef::new("user", "alice", None)]);
    }

    #[tokio::test]
    async fn test_tuple_reader_maps_missing_store() {
        let reader = SnapshotTupleReader::pin(&MemoryDataStore::new(), "ghost")
            .await
            .unwrap();
        let err = reader
            .list_objects_by_type("ghost", "document")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StoreNotFound { .. }));
    }

    #[tokio::test]
    async fn test_model_reader_without_models_reports_latest() {
        let storage = storage_with_store().await;
        let reader = DataStoreModelReader::new(storage);

        let err = reader.get_model("test-store", None).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::AuthorizationModelNotFound { ref model_id } if model_id == "latest"
        ));

        let err = reader
            .get_model("test-store", Some("01HUNKNOWN"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AuthorizationModelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_model_reader_caches_parsed_models() {
        let storage = storage_with_store().await;
        storage
            .write_authorization_model(StoredAuthorizationModel::new(
                "01HMODEL", "test-store", "1.1", MODEL,
            ))
            .await
            .unwrap();

        let reader = DataStoreModelReader::new(storage);
        let latest = reader.get_model("test-store", None).await.unwrap();
        let pinned = reader
            .get_model("test-store", Some("01HMODEL"))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&latest, &pinned));
        assert!(latest.has_relation("document", "viewer"));
        assert_eq!(reader.cached_models(), 1);

        reader.evict_store("test-store");
        assert_eq!(reader.cached_models(), 0);
    }

    const TEAM_MODEL: &str = r#"{
        "schema_version": "1.1",
        "type_definitions": [
            {"type": "user"},
            {
                "type": "team",
                "relations": {"member": {"this": {}}},
                "metadata": {"relations": {"member": {"directly_related_user_types": [{"type": "user"}]}}}
            },
            {
                "type": "document",
                "relations": {"editor": {"this": {}}},
                "metadata": {"relations": {"editor": {"directly_related_user_types": [{"type": "team", "relation": "member"}]}}}
            }
        ]
    }"#;

    fn bob_in(team: &str) -> StoredTuple {
        StoredTuple::new("team", team, "member", "user", "bob", None)
    }

    /// Moves bob from team:z to team:a the first time team:a's members are
    /// read, i.e. in the middle of a check.
    struct MoveBobDuringCheck {
        inner: SnapshotTupleReader,
        storage: Arc<MemoryDataStore>,
        moved: AtomicBool,
    }

    #[async_trait]
    impl TupleReader for MoveBobDuringCheck {
        async fn read_tuples(
            &self,
            store_id: &str,
            object_type: &str,
            object_id: &str,
            relation: &str,
        ) -> DomainResult<Vec<StoredTupleRef>> {
            let tuples = self
                .inner
                .read_tuples(store_id, object_type, object_id, relation)
                .await?;
            if (object_type, object_id) == ("team", "a") && !self.moved.swap(true, Ordering::SeqCst)
            {
                self.storage
                    .write_tuples(store_id, vec![bob_in("a")], vec![bob_in("z")])
                    .await
                    .map_err(storage_to_domain)?;
            }
            Ok(tuples)
        }

        async fn store_exists(&self, store_id: &str) -> DomainResult<bool> {
            self.inner.store_exists(store_id).await
        }
    }

    #[tokio::test]
    async fn test_check_ignores_batch_committed_mid_resolution() {
        let storage = storage_with_store().await;
        storage
            .write_authorization_model(StoredAuthorizationModel::new(
                "01HTEAMS", "test-store", "1.1", TEAM_MODEL,
            ))
            .await
            .unwrap();
        storage
            .write_tuples(
                "test-store",
                vec![
                    StoredTuple::new("document", "doc", "editor", "team", "a", Some("member".into())),
                    StoredTuple::new("document", "doc", "editor", "team", "z", Some("member".into())),
                    bob_in("z"),
                ],
                vec![],
            )
            .await
            .unwrap();

        let reader = MoveBobDuringCheck {
            inner: SnapshotTupleReader::pin(storage.as_ref(), "test-store")
                .await
                .unwrap(),
            storage: Arc::clone(&storage),
            moved: AtomicBool::new(false),
        };
        let resolver = GraphResolver::new(
            Arc::new(reader),
            Arc::new(DataStoreModelReader::new(Arc::clone(&storage))),
        );

        // bob is an editor both before (via z) and after (via a) the batch
        let result = resolver
            .check(&CheckRequest::new("test-store", "user:bob", "editor", "document:doc"))
            .await
            .unwrap();
        assert!(result.allowed);

        let members = storage
            .read_tuples_by_user("test-store", "user:bob", Some("member"))
            .await
            .unwrap();
        assert_eq!(members, vec![bob_in("a")], "batch must have landed mid-check");
    }
}

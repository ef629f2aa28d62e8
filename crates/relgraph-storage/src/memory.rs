//! In-memory storage implementation.
//!
//! Each store owns an `Arc<TupleIndex>` behind a `tokio::sync::RwLock`. The
//! index keeps two views of the same tuple set so that lookups by object and
//! by subject both cost O(matching) instead of a scan. Snapshots share the
//! `Arc`; a batch written while one is held copies the index first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    parse_user_filter, validate_store_id, validate_store_name, validate_tuple, DataStore, Store,
    StoredAuthorizationModel, StoredTuple, TupleFilter, TupleSnapshot,
};

/// Subject key in the user index: `(user_id, user_relation)`.
type SubjectKey = (String, Option<String>);

/// Tuples of one store, indexed by object and by subject.
#[derive(Debug, Clone, Default)]
struct TupleIndex {
    /// object_type -> object_id -> tuples
    by_object: HashMap<String, HashMap<String, HashSet<StoredTuple>>>,
    /// user_type -> (user_id, user_relation) -> tuples
    by_user: HashMap<String, HashMap<SubjectKey, HashSet<StoredTuple>>>,
    len: usize,
}

impl TupleIndex {
    fn insert(&mut self, tuple: StoredTuple) {
        let inserted = self
            .by_object
            .entry(tuple.object_type.clone())
            .or_default()
            .entry(tuple.object_id.clone())
            .or_default()
            .insert(tuple.clone());
        if !inserted {
            return;
        }
        self.by_user
            .entry(tuple.user_type.clone())
            .or_default()
            .entry((tuple.user_id.clone(), tuple.user_relation.clone()))
            .or_default()
            .insert(tuple);
        self.len += 1;
    }

    fn remove(&mut self, tuple: &StoredTuple) {
        let Some(objects) = self.by_object.get_mut(&tuple.object_type) else {
            return;
        };
        let Some(set) = objects.get_mut(&tuple.object_id) else {
            return;
        };
        if !set.remove(tuple) {
            return;
        }
        if set.is_empty() {
            objects.remove(&tuple.object_id);
            if objects.is_empty() {
                self.by_object.remove(&tuple.object_type);
            }
        }

        if let Some(subjects) = self.by_user.get_mut(&tuple.user_type) {
            let key = (tuple.user_id.clone(), tuple.user_relation.clone());
            if let Some(set) = subjects.get_mut(&key) {
                set.remove(tuple);
                if set.is_empty() {
                    subjects.remove(&key);
                }
            }
            if subjects.is_empty() {
                self.by_user.remove(&tuple.user_type);
            }
        }
        self.len -= 1;
    }

    fn by_object(&self, object_type: &str, object_id: &str) -> impl Iterator<Item = &StoredTuple> {
        self.by_object
            .get(object_type)
            .and_then(|objects| objects.get(object_id))
            .into_iter()
            .flatten()
    }

    fn by_user(
        &self,
        user_type: &str,
        user_id: &str,
        user_relation: Option<&str>,
    ) -> impl Iterator<Item = &StoredTuple> {
        let key = (user_id.to_string(), user_relation.map(str::to_string));
        self.by_user
            .get(user_type)
            .and_then(|subjects| subjects.get(&key))
            .into_iter()
            .flatten()
    }

    fn by_type(&self, object_type: &str) -> impl Iterator<Item = &StoredTuple> {
        self.by_object
            .get(object_type)
            .into_iter()
            .flat_map(|objects| objects.values().flatten())
    }

    fn all(&self) -> impl Iterator<Item = &StoredTuple> {
        self.by_object
            .values()
            .flat_map(|objects| objects.values().flatten())
    }
}

impl TupleSnapshot for TupleIndex {
    fn read_tuples_by_object(
        &self,
        object_type: &str,
        object_id: &str,
        relation: Option<&str>,
    ) -> Vec<StoredTuple> {
        sorted(
            self.by_object(object_type, object_id)
                .filter(|t| relation.map_or(true, |r| t.relation == r))
                .cloned(),
        )
    }

    fn list_objects_by_type(&self, object_type: &str) -> Vec<String> {
        let ids: BTreeSet<&String> = self
            .by_object
            .get(object_type)
            .into_iter()
            .flat_map(|objects| objects.keys())
            .collect();
        ids.into_iter().cloned().collect()
    }

    fn list_users_by_type(&self, user_type: &str, user_relation: Option<&str>) -> Vec<String> {
        let users: BTreeSet<String> = self
            .by_user
            .get(user_type)
            .into_iter()
            .flat_map(|subjects| subjects.keys())
            .filter(|(_, relation)| relation.as_deref() == user_relation)
            .map(|(id, relation)| match relation {
                Some(relation) => format!("{user_type}:{id}#{relation}"),
                None => format!("{user_type}:{id}"),
            })
            .collect();
        users.into_iter().collect()
    }
}

/// State owned by a single store.
#[derive(Debug)]
struct StoreState {
    store: Store,
    tuples: RwLock<Arc<TupleIndex>>,
    /// Published models in publish order.
    models: RwLock<Vec<StoredAuthorizationModel>>,
}

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Write/delete tuple**: O(1) average per tuple
/// - **Read by object or subject**: O(matching)
/// - **Unindexed filters**: O(N) scan of the store
/// - **Store operations**: O(1) (DashMap lookup)
///
/// A write batch holds the store's write lock for its whole duration, so
/// readers observe either none or all of it. While a snapshot is held, the
/// next batch pays one O(N) copy of the index.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    stores: DashMap<String, Arc<StoreState>>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Looks up a store without holding the map guard across an await.
    fn state(&self, store_id: &str) -> StorageResult<Arc<StoreState>> {
        self.stores
            .get(store_id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })
    }
}

fn matches_filter(
    tuple: &StoredTuple,
    filter: &TupleFilter,
    user: Option<&(String, String, Option<String>)>,
) -> bool {
    filter
        .object_type
        .as_ref()
        .map_or(true, |ot| &tuple.object_type == ot)
        && filter
            .object_id
            .as_ref()
            .map_or(true, |oi| &tuple.object_id == oi)
        && filter.relation.as_ref().map_or(true, |r| &tuple.relation == r)
        && user.map_or(true, |(ut, ui, ur)| {
            &tuple.user_type == ut && &tuple.user_id == ui && &tuple.user_relation == ur
        })
}

fn sorted(tuples: impl Iterator<Item = StoredTuple>) -> Vec<StoredTuple> {
    let mut tuples: Vec<StoredTuple> = tuples.collect();
    tuples.sort();
    tuples
}

#[async_trait]
impl DataStore for MemoryDataStore {
    #[instrument(skip(self), fields(store_id = %id))]
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store> {
        validate_store_id(id)?;
        validate_store_name(name)?;

        let now = chrono::Utc::now();
        let store = Store {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        // Entry API keeps check-and-insert atomic
        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(StorageError::StoreAlreadyExists {
                    store_id: id.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(StoreState {
                    store: store.clone(),
                    tuples: RwLock::new(Arc::new(TupleIndex::default())),
                    models: RwLock::new(Vec::new()),
                }));
            }
        }

        debug!("store created");
        Ok(store)
    }

    async fn get_store(&self, id: &str) -> StorageResult<Store> {
        Ok(self.state(id)?.store.clone())
    }

    #[instrument(skip(self), fields(store_id = %id))]
    async fn delete_store(&self, id: &str) -> StorageResult<()> {
        if self.stores.remove(id).is_none() {
            return Err(StorageError::StoreNotFound {
                store_id: id.to_string(),
            });
        }
        debug!("store deleted");
        Ok(())
    }

    async fn list_stores(&self) -> StorageResult<Vec<Store>> {
        let mut stores: Vec<Store> = self.stores.iter().map(|s| s.store.clone()).collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(stores)
    }

    #[instrument(
        skip(self, writes, deletes),
        fields(store_id = %store_id, writes = writes.len(), deletes = deletes.len())
    )]
    async fn write_tuples(
        &self,
        store_id: &str,
        writes: Vec<StoredTuple>,
        deletes: Vec<StoredTuple>,
    ) -> StorageResult<()> {
        // Validate everything before touching the index
        validate_store_id(store_id)?;
        for tuple in writes.iter().chain(deletes.iter()) {
            validate_tuple(tuple)?;
        }

        let state = self.state(store_id)?;
        let mut guard = state.tuples.write().await;
        let index = Arc::make_mut(&mut *guard);

        for tuple in &deletes {
            index.remove(tuple);
        }
        for tuple in writes {
            index.insert(tuple);
        }

        debug!(total = index.len, "tuple batch applied");
        Ok(())
    }

    async fn read_tuples(
        &self,
        store_id: &str,
        filter: &TupleFilter,
    ) -> StorageResult<Vec<StoredTuple>> {
        if filter.object_id.is_some() && filter.object_type.is_none() {
            return Err(StorageError::InvalidFilter {
                message: "object_id requires object_type".to_string(),
            });
        }
        let user = filter.user.as_deref().map(parse_user_filter).transpose()?;

        let state = self.state(store_id)?;
        let index = state.tuples.read().await;

        // Pick the narrowest index the filter allows
        let candidates: Box<dyn Iterator<Item = &StoredTuple> + Send> =
            match (&filter.object_type, &filter.object_id, &user) {
                (Some(ot), Some(oi), _) => Box::new(index.by_object(ot, oi)),
                (_, _, Some((ut, ui, ur))) => Box::new(index.by_user(ut, ui, ur.as_deref())),
                (Some(ot), None, None) => Box::new(index.by_type(ot)),
                _ => Box::new(index.all()),
            };

        Ok(sorted(
            candidates
                .filter(|t| matches_filter(t, filter, user.as_ref()))
                .cloned(),
        ))
    }

    async fn read_tuples_by_object(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>> {
        let state = self.state(store_id)?;
        let index = state.tuples.read().await;
        Ok(index.read_tuples_by_object(object_type, object_id, relation))
    }

    async fn read_tuples_by_user(
        &self,
        store_id: &str,
        user: &str,
        relation: Option<&str>,
    ) -> StorageResult<Vec<StoredTuple>> {
        let (user_type, user_id, user_relation) = parse_user_filter(user)?;
        let state = self.state(store_id)?;
        let index = state.tuples.read().await;
        Ok(sorted(
            index
                .by_user(&user_type, &user_id, user_relation.as_deref())
                .filter(|t| relation.map_or(true, |r| t.relation == r))
                .cloned(),
        ))
    }

    async fn list_objects_by_type(
        &self,
        store_id: &str,
        object_type: &str,
    ) -> StorageResult<Vec<String>> {
        let state = self.state(store_id)?;
        let index = state.tuples.read().await;
        Ok(index.list_objects_by_type(object_type))
    }

    async fn list_users_by_type(
        &self,
        store_id: &str,
        user_type: &str,
        user_relation: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        let state = self.state(store_id)?;
        let index = state.tuples.read().await;
        Ok(index.list_users_by_type(user_type, user_relation))
    }

    async fn snapshot(&self, store_id: &str) -> StorageResult<Arc<dyn TupleSnapshot>> {
        let state = self.state(store_id)?;
        let index = state.tuples.read().await;
        Ok(Arc::clone(&*index) as Arc<dyn TupleSnapshot>)
    }

    // Authorization model operations

    #[instrument(skip(self, model), fields(store_id = %model.store_id, model_id = %model.id))]
    async fn write_authorization_model(
        &self,
        model: StoredAuthorizationModel,
    ) -> StorageResult<StoredAuthorizationModel> {
        validate_store_id(&model.store_id)?;
        let state = self.state(&model.store_id)?;

        let mut models = state.models.write().await;
        if models.iter().any(|m| m.id == model.id) {
            return Err(StorageError::InvalidInput {
                message: format!("authorization model {} already exists", model.id),
            });
        }
        models.push(model.clone());

        debug!(models = models.len(), "authorization model stored");
        Ok(model)
    }

    async fn get_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> StorageResult<StoredAuthorizationModel> {
        let state = self.state(store_id)?;
        let models = state.models.read().await;
        models
            .iter()
            .find(|m| m.id == model_id)
            .cloned()
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    async fn list_authorization_models(
        &self,
        store_id: &str,
    ) -> StorageResult<Vec<StoredAuthorizationModel>> {
        let state = self.state(store_id)?;
        let models = state.models.read().await;
        Ok(models.iter().rev().cloned().collect())
    }

    async fn get_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> StorageResult<StoredAuthorizationModel> {
        let state = self.state(store_id)?;
        let models = state.models.read().await;
        models
            .last()
            .cloned()
            .ok_or_else(|| StorageError::ModelNotFound {
                model_id: format!("latest (no models exist for store {store_id})"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn viewer(object_id: &str, user_id: &str) -> StoredTuple {
        StoredTuple::new("document", object_id, "viewer", "user", user_id, None)
    }

    async fn store_with(tuples: Vec<StoredTuple>) -> MemoryDataStore {
        let store = MemoryDataStore::new();
        store.create_store("test-store", "Test").await.unwrap();
        store.write_tuples("test-store", tuples, vec![]).await.unwrap();
        store
    }

    async fn all_tuples(store: &MemoryDataStore) -> Vec<StoredTuple> {
        store
            .read_tuples("test-store", &TupleFilter::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_store() {
        let store = MemoryDataStore::new();
        let created = store.create_store("test-id", "Test Store").await.unwrap();

        assert_eq!(created.id, "test-id");
        assert_eq!(created.name, "Test Store");

        let retrieved = store.get_store("test-id").await.unwrap();
        assert_eq!(retrieved, created);
    }

    #[tokio::test]
    async fn test_get_nonexistent_store() {
        let store = MemoryDataStore::new();
        let result = store.get_store("nonexistent").await;

        assert!(matches!(result, Err(StorageError::StoreNotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_duplicate_store_fails() {
        let store = MemoryDataStore::new();
        store.create_store("test-store", "Test").await.unwrap();

        let result = store.create_store("test-store", "Again").await;
        assert!(matches!(result, Err(StorageError::StoreAlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_list_stores_oldest_first() {
        let store = MemoryDataStore::new();
        store.create_store("a", "First").await.unwrap();
        store.create_store("b", "Second").await.unwrap();

        let ids: Vec<String> = store
            .list_stores()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_store_removes_tuples_and_models() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;
        store
            .write_authorization_model(StoredAuthorizationModel::new("m1", "test-store", "1.1", "{}"))
            .await
            .unwrap();

        store.delete_store("test-store").await.unwrap();
        assert!(matches!(
            store.get_store("test-store").await,
            Err(StorageError::StoreNotFound { .. })
        ));

        // Recreating starts empty
        store.create_store("test-store", "Test").await.unwrap();
        assert!(all_tuples(&store).await.is_empty());
        assert!(store
            .list_authorization_models("test-store")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_write_and_read_tuple() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;

        let tuples = all_tuples(&store).await;
        assert_eq!(tuples, vec![viewer("doc1", "alice")]);
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;
        store
            .write_tuple("test-store", viewer("doc1", "alice"))
            .await
            .unwrap();

        assert_eq!(all_tuples(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_absent_tuple_is_noop() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;
        store
            .delete_tuple("test-store", viewer("doc1", "bob"))
            .await
            .unwrap();
        store
            .delete_tuple("test-store", viewer("doc9", "alice"))
            .await
            .unwrap();

        assert_eq!(all_tuples(&store).await, vec![viewer("doc1", "alice")]);
    }

    #[tokio::test]
    async fn test_deletes_apply_before_writes() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;
        store
            .write_tuples(
                "test-store",
                vec![viewer("doc1", "alice")],
                vec![viewer("doc1", "alice")],
            )
            .await
            .unwrap();

        assert_eq!(all_tuples(&store).await, vec![viewer("doc1", "alice")]);
    }

    #[tokio::test]
    async fn test_invalid_tuple_rejects_whole_batch() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;

        let result = store
            .write_tuples(
                "test-store",
                vec![viewer("doc2", "bob"), viewer("doc3", "")],
                vec![viewer("doc1", "alice")],
            )
            .await;

        assert!(matches!(result, Err(StorageError::InvalidInput { .. })));
        assert_eq!(
            all_tuples(&store).await,
            vec![viewer("doc1", "alice")],
            "a rejected batch must leave the store unchanged"
        );
    }

    #[tokio::test]
    async fn test_write_to_nonexistent_store_fails() {
        let store = MemoryDataStore::new();
        let result = store.write_tuple("missing", viewer("doc1", "alice")).await;
        assert!(matches!(result, Err(StorageError::StoreNotFound { .. })));
    }

    #[tokio::test]
    async fn test_read_by_object_and_relation() {
        let owner = StoredTuple::new("document", "doc1", "owner", "user", "alice", None);
        let store = store_with(vec![
            viewer("doc1", "alice"),
            viewer("doc1", "bob"),
            viewer("doc2", "alice"),
            owner.clone(),
        ])
        .await;

        let doc1 = store
            .read_tuples_by_object("test-store", "document", "doc1", None)
            .await
            .unwrap();
        assert_eq!(doc1.len(), 3);

        let owners = store
            .read_tuples_by_object("test-store", "document", "doc1", Some("owner"))
            .await
            .unwrap();
        assert_eq!(owners, vec![owner]);
    }

    #[tokio::test]
    async fn test_read_by_user_distinguishes_usersets() {
        let member = StoredTuple::new(
            "document",
            "doc1",
            "editor",
            "team",
            "eng",
            Some("member".to_string()),
        );
        let plain = StoredTuple::new("document", "doc2", "editor", "team", "eng", None);
        let store = store_with(vec![member.clone(), plain.clone()]).await;

        let usersets = store
            .read_tuples_by_user("test-store", "team:eng#member", None)
            .await
            .unwrap();
        assert_eq!(usersets, vec![member]);

        let direct = store
            .read_tuples_by_user("test-store", "team:eng", Some("editor"))
            .await
            .unwrap();
        assert_eq!(direct, vec![plain]);
    }

    #[tokio::test]
    async fn test_read_tuples_filters() {
        let store = store_with(vec![
            viewer("doc1", "alice"),
            viewer("doc2", "alice"),
            viewer("doc2", "bob"),
            StoredTuple::new("folder", "root", "viewer", "user", "alice", None),
        ])
        .await;

        let by_type = store
            .read_tuples(
                "test-store",
                &TupleFilter {
                    object_type: Some("document".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_type.len(), 3);

        let by_user_and_type = store
            .read_tuples(
                "test-store",
                &TupleFilter {
                    object_type: Some("document".to_string()),
                    user: Some("user:alice".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            by_user_and_type,
            vec![viewer("doc1", "alice"), viewer("doc2", "alice")]
        );

        let by_relation = store
            .read_tuples(
                "test-store",
                &TupleFilter {
                    relation: Some("owner".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(by_relation.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_filters_are_rejected() {
        let store = store_with(vec![]).await;

        let bad_user = TupleFilter {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.read_tuples("test-store", &bad_user).await,
            Err(StorageError::InvalidFilter { .. })
        ));

        let id_without_type = TupleFilter {
            object_id: Some("doc1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.read_tuples("test-store", &id_without_type).await,
            Err(StorageError::InvalidFilter { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_objects_and_users_by_type() {
        let store = store_with(vec![
            viewer("doc2", "bob"),
            viewer("doc1", "alice"),
            viewer("doc1", "*"),
            StoredTuple::new(
                "document",
                "doc3",
                "editor",
                "team",
                "eng",
                Some("member".to_string()),
            ),
        ])
        .await;

        assert_eq!(
            store.list_objects_by_type("test-store", "document").await.unwrap(),
            vec!["doc1", "doc2", "doc3"]
        );
        assert_eq!(
            store.list_users_by_type("test-store", "user", None).await.unwrap(),
            vec!["user:*", "user:alice", "user:bob"]
        );
        assert_eq!(
            store
                .list_users_by_type("test-store", "team", Some("member"))
                .await
                .unwrap(),
            vec!["team:eng#member"]
        );
        assert!(store
            .list_users_by_type("test-store", "team", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_deleted_tuples_leave_indexes() {
        let store = store_with(vec![viewer("doc1", "alice")]).await;
        store
            .delete_tuple("test-store", viewer("doc1", "alice"))
            .await
            .unwrap();

        assert!(store
            .list_objects_by_type("test-store", "document")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .list_users_by_type("test-store", "user", None)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .read_tuples_by_user("test-store", "user:alice", None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_frozen_against_later_batches() {
        let store = store_with(vec![viewer("doc1", "alice"), viewer("doc2", "bob")]).await;
        let snapshot = store.snapshot("test-store").await.unwrap();

        store
            .write_tuples(
                "test-store",
                vec![viewer("doc3", "carol")],
                vec![viewer("doc1", "alice")],
            )
            .await
            .unwrap();

        assert_eq!(
            snapshot.read_tuples_by_object("document", "doc1", Some("viewer")),
            vec![viewer("doc1", "alice")]
        );
        assert_eq!(snapshot.list_objects_by_type("document"), vec!["doc1", "doc2"]);
        assert_eq!(
            snapshot.list_users_by_type("user", None),
            vec!["user:alice", "user:bob"]
        );

        // The live store and a fresh snapshot see the batch
        let fresh = store.snapshot("test-store").await.unwrap();
        assert!(fresh
            .read_tuples_by_object("document", "doc1", None)
            .is_empty());
        assert_eq!(fresh.list_objects_by_type("document"), vec!["doc2", "doc3"]);
        assert_eq!(
            store
                .list_objects_by_type("test-store", "document")
                .await
                .unwrap(),
            vec!["doc2", "doc3"]
        );
    }

    #[tokio::test]
    async fn test_snapshot_of_missing_store_fails() {
        let store = MemoryDataStore::new();
        assert!(matches!(
            store.snapshot("ghost").await,
            Err(StorageError::StoreNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_models_newest_first() {
        let store = store_with(vec![]).await;
        for id in ["m1", "m2", "m3"] {
            store
                .write_authorization_model(StoredAuthorizationModel::new(id, "test-store", "1.1", "{}"))
                .await
                .unwrap();
        }

        let ids: Vec<String> = store
            .list_authorization_models("test-store")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m3", "m2", "m1"]);

        let latest = store.get_latest_authorization_model("test-store").await.unwrap();
        assert_eq!(latest.id, "m3");

        let m1 = store.get_authorization_model("test-store", "m1").await.unwrap();
        assert_eq!(m1.id, "m1");
    }

    #[tokio::test]
    async fn test_model_lookups_fail_when_missing() {
        let store = store_with(vec![]).await;

        assert!(matches!(
            store.get_latest_authorization_model("test-store").await,
            Err(StorageError::ModelNotFound { .. })
        ));
        assert!(matches!(
            store.get_authorization_model("test-store", "nope").await,
            Err(StorageError::ModelNotFound { .. })
        ));
        assert!(matches!(
            store.get_authorization_model("missing", "nope").await,
            Err(StorageError::StoreNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_model_id_rejected() {
        let store = store_with(vec![]).await;
        let model = StoredAuthorizationModel::new("m1", "test-store", "1.1", "{}");
        store.write_authorization_model(model.clone()).await.unwrap();

        let result = store.write_authorization_model(model).await;
        assert!(matches!(result, Err(StorageError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_writes_dont_lose_data() {
        let store = MemoryDataStore::new_shared();
        store.create_store("test-store", "Test").await.unwrap();

        let num_tasks = 100;
        let mut handles = Vec::with_capacity(num_tasks);

        for i in 0..num_tasks {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .write_tuple("test-store", viewer(&format!("doc{i}"), &format!("user{i}")))
                    .await
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let result = store
            .read_tuples("test-store", &TupleFilter::default())
            .await
            .unwrap();
        assert_eq!(
            result.len(),
            num_tasks,
            "All concurrent writes should be preserved"
        );
    }

    #[tokio::test]
    async fn test_readers_never_see_half_a_batch() {
        let store = MemoryDataStore::new_shared();
        store.create_store("test-store", "Test").await.unwrap();

        let batch_size = 20;
        let mut handles = Vec::new();

        // Writers: each batch adds `batch_size` tuples for one document
        for batch in 0..25 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let writes = (0..batch_size)
                    .map(|u| viewer(&format!("doc{batch}"), &format!("user{u}")))
                    .collect();
                store.write_tuples("test-store", writes, vec![]).await.unwrap();
            }));
        }

        // Readers: the tuple count is always a whole number of batches
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let seen = store
                    .read_tuples("test-store", &TupleFilter::default())
                    .await
                    .unwrap()
                    .len();
                assert_eq!(seen % batch_size, 0, "observed a partial batch: {seen}");
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(
            store
                .read_tuples("test-store", &TupleFilter::default())
                .await
                .unwrap()
                .len(),
            25 * batch_size
        );
    }
}

//! The `AuthzService` implementation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, instrument};
use ulid::Ulid;

use relgraph_domain::model::{
    parse_model, to_json, AuthorizationModel, Object, TypeSystem, User,
};
use relgraph_domain::resolver::{
    CheckRequest, GraphResolver, ListObjectsRequest, ListUsersRequest, ModelReader, ResolverConfig,
};
use relgraph_domain::validation::validate_model;
use relgraph_storage::{
    DataStore, MemoryDataStore, StorageError, StoredAuthorizationModel, StoredTuple, TupleFilter,
};

use crate::adapters::{DataStoreModelReader, SnapshotTupleReader};
use crate::config::ServerConfig;
use crate::error::{ServiceError, ServiceResult};

use super::types::{
    to_tuple_key, AuthorizationModelResponse, CheckParams, CheckResponse, ListObjectsParams,
    ListObjectsResponse, ListUsersParams, ListUsersResponse, ReadRequest, StoreResponse,
    TupleKey, WriteAuthorizationModelResponse, WriteRequest,
};

type Resolver<S> = GraphResolver<SnapshotTupleReader, DataStoreModelReader<S>>;

struct Inner<S: DataStore> {
    config: ServerConfig,
    resolver_config: ResolverConfig,
    storage: Arc<S>,
    models: Arc<DataStoreModelReader<S>>,
}

/// Embedded authorization service over a `DataStore`.
///
/// Cloning is cheap; clones share storage and the model cache. Each check
/// or list query resolves against its own snapshot of the store's tuples.
pub struct AuthzService<S: DataStore> {
    inner: Arc<Inner<S>>,
}

impl<S: DataStore> Clone for AuthzService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AuthzService<MemoryDataStore> {
    /// Creates a service backed by a fresh in-memory store.
    pub fn in_memory(config: ServerConfig) -> Self {
        Self::new(MemoryDataStore::new_shared(), config)
    }
}

impl<S: DataStore> AuthzService<S> {
    pub fn new(storage: Arc<S>, config: ServerConfig) -> Self {
        let models = Arc::new(DataStoreModelReader::new(Arc::clone(&storage)));
        Self {
            inner: Arc::new(Inner {
                resolver_config: config.resolver.to_resolver_config(),
                config,
                storage,
                models,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.inner.storage
    }

    /// A resolver whose tuple reads all come from one snapshot of the store.
    async fn pinned_resolver(&self, store_id: &str) -> ServiceResult<Resolver<S>> {
        let tuples = SnapshotTupleReader::pin(self.inner.storage.as_ref(), store_id).await?;
        Ok(GraphResolver::with_config(
            Arc::new(tuples),
            Arc::clone(&self.inner.models),
            self.inner.resolver_config.clone(),
        ))
    }

    // ============================================================
    // Stores
    // ============================================================

    #[instrument(skip(self))]
    pub async fn create_store(&self, name: &str) -> ServiceResult<StoreResponse> {
        let id = Ulid::new().to_string();
        let store = self.inner.storage.create_store(&id, name).await?;
        info!(store_id = %store.id, "store created");
        Ok(store.into())
    }

    pub async fn get_store(&self, store_id: &str) -> ServiceResult<StoreResponse> {
        Ok(self.inner.storage.get_store(store_id).await?.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_store(&self, store_id: &str) -> ServiceResult<()> {
        self.inner.storage.delete_store(store_id).await?;
        self.inner.models.evict_store(store_id);
        info!(store_id, "store deleted");
        Ok(())
    }

    pub async fn list_stores(&self) -> ServiceResult<Vec<StoreResponse>> {
        let stores = self.inner.storage.list_stores().await?;
        Ok(stores.into_iter().map(StoreResponse::from).collect())
    }

    // ============================================================
    // Authorization models
    // ============================================================

    /// Parses, validates and publishes a model document.
    ///
    /// The stored form is the canonical re-rendering of the parsed model,
    /// so later reads are independent of the input's formatting.
    #[instrument(skip(self, model_json), fields(bytes = model_json.len()))]
    pub async fn write_authorization_model(
        &self,
        store_id: &str,
        model_json: &str,
    ) -> ServiceResult<WriteAuthorizationModelResponse> {
        let limits = &self.inner.config.limits;
        self.inner.storage.get_store(store_id).await?;

        if model_json.len() > limits.max_model_size_bytes {
            return Err(ServiceError::validation_error(format!(
                "authorization model exceeds maximum size of {} bytes",
                limits.max_model_size_bytes
            )));
        }

        let model = parse_model(model_json)?;
        if model.type_definitions.len() > limits.max_types_per_model {
            return Err(ServiceError::validation_error(format!(
                "authorization model defines {} types, maximum is {}",
                model.type_definitions.len(),
                limits.max_types_per_model
            )));
        }
        validate_model(&model)?;

        let canonical = to_json(&model)?;
        if canonical.len() > limits.max_model_size_bytes {
            return Err(ServiceError::validation_error(format!(
                "authorization model exceeds maximum size of {} bytes",
                limits.max_model_size_bytes
            )));
        }

        let model_id = Ulid::new().to_string();
        self.inner
            .storage
            .write_authorization_model(StoredAuthorizationModel::new(
                &model_id,
                store_id,
                &model.schema_version,
                canonical,
            ))
            .await?;

        info!(store_id, authorization_model_id = %model_id, "authorization model published");
        Ok(WriteAuthorizationModelResponse {
            authorization_model_id: model_id,
        })
    }

    pub async fn get_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
    ) -> ServiceResult<AuthorizationModel> {
        let model = self.inner.models.get_model(store_id, Some(model_id)).await?;
        Ok(model.model().clone())
    }

    /// Lists a store's models, newest first.
    pub async fn list_authorization_models(
        &self,
        store_id: &str,
    ) -> ServiceResult<Vec<AuthorizationModelResponse>> {
        self.inner
            .storage
            .list_authorization_models(store_id)
            .await?
            .into_iter()
            .map(Self::model_response)
            .collect()
    }

    /// Gets the store's active model.
    pub async fn get_latest_authorization_model(
        &self,
        store_id: &str,
    ) -> ServiceResult<AuthorizationModelResponse> {
        let stored = self
            .inner
            .storage
            .get_latest_authorization_model(store_id)
            .await
            .map_err(|e| match e {
                StorageError::ModelNotFound { .. } => {
                    ServiceError::latest_authorization_model_not_found(
                        "no authorization model found for store",
                    )
                }
                other => other.into(),
            })?;
        Self::model_response(stored)
    }

    fn model_response(stored: StoredAuthorizationModel) -> ServiceResult<AuthorizationModelResponse> {
        // Stored documents went through parse_model at publish time
        let model = parse_model(&stored.model_json).map_err(|e| {
            error!(model_id = %stored.id, "failed to parse stored authorization model: {e}");
            ServiceError::internal_error("failed to parse authorization model")
        })?;
        Ok(AuthorizationModelResponse {
            id: stored.id,
            created_at: stored.created_at,
            model,
        })
    }

    // ============================================================
    // Tuples
    // ============================================================

    /// Validates a batch against the model and applies it atomically.
    #[instrument(
        skip(self, request),
        fields(writes = request.writes.len(), deletes = request.deletes.len())
    )]
    pub async fn write(&self, store_id: &str, request: WriteRequest) -> ServiceResult<()> {
        let total = request.writes.len() + request.deletes.len();
        let max = self.inner.config.limits.max_tuples_per_write;
        if total == 0 {
            return Err(ServiceError::validation_error(
                "write request must contain at least one tuple",
            ));
        }
        if total > max {
            return Err(ServiceError::validation_error(format!(
                "write request contains {total} tuples, maximum is {max}"
            )));
        }

        let deleted: HashSet<&TupleKey> = request.deletes.iter().collect();
        if let Some(tuple) = request.writes.iter().find(|t| deleted.contains(t)) {
            return Err(ServiceError::validation_error(format!(
                "tuple {tuple} cannot be both written and deleted in one request"
            )));
        }

        self.inner.storage.get_store(store_id).await?;
        let model = self
            .inner
            .models
            .get_model(store_id, request.authorization_model_id.as_deref())
            .await?;

        let writes = Self::validated_batch(&model, &request.writes, "write")?;
        let deletes = Self::validated_batch(&model, &request.deletes, "delete")?;

        self.inner
            .storage
            .write_tuples(store_id, writes, deletes)
            .await?;
        info!(store_id, "tuples written");
        Ok(())
    }

    fn validated_batch(
        model: &TypeSystem,
        tuples: &[TupleKey],
        operation: &str,
    ) -> ServiceResult<Vec<StoredTuple>> {
        tuples
            .iter()
            .enumerate()
            .map(|(i, tuple)| {
                model.validate_tuple(tuple).map_err(|e| {
                    ServiceError::validation_error(format!("invalid {operation} at index {i}: {e}"))
                })?;
                stored_tuple(tuple)
            })
            .collect()
    }

    /// Reads tuples matching the request's filters, sorted.
    pub async fn read(&self, store_id: &str, request: ReadRequest) -> ServiceResult<Vec<TupleKey>> {
        let (object_type, object_id) = match request.object.as_deref() {
            None | Some("") => (None, None),
            Some(object) => match object.split_once(':') {
                Some((object_type, "")) if !object_type.is_empty() => {
                    (Some(object_type.to_string()), None)
                }
                Some(_) => {
                    let object = Object::parse(object).map_err(|e| {
                        ServiceError::validation_error(format!("invalid object '{object}': {e}"))
                    })?;
                    (Some(object.object_type), Some(object.object_id))
                }
                None => {
                    return Err(ServiceError::validation_error(format!(
                        "object filter must be type: or type:id, got '{object}'"
                    )))
                }
            },
        };

        let filter = TupleFilter {
            object_type,
            object_id,
            relation: request.relation.filter(|r| !r.is_empty()),
            user: request.user.filter(|u| !u.is_empty()),
        };

        let tuples = self.inner.storage.read_tuples(store_id, &filter).await?;
        Ok(tuples.iter().map(to_tuple_key).collect())
    }

    // ============================================================
    // Queries
    // ============================================================

    #[instrument(
        skip(self, params),
        fields(
            user = %params.tuple_key.user,
            relation = %params.tuple_key.relation,
            object = %params.tuple_key.object
        )
    )]
    pub async fn check(&self, store_id: &str, params: CheckParams) -> ServiceResult<CheckResponse> {
        let CheckParams {
            tuple_key,
            authorization_model_id,
            timeout,
            cancellation,
        } = params;

        let mut request = CheckRequest::new(
            store_id,
            tuple_key.user,
            tuple_key.relation,
            tuple_key.object,
        );
        request.authorization_model_id = authorization_model_id;
        request.timeout = timeout;
        request.cancellation = cancellation;

        let result = self.pinned_resolver(store_id).await?.check(&request).await?;
        info!(store_id, allowed = result.allowed, "check");
        Ok(CheckResponse {
            allowed: result.allowed,
        })
    }

    #[instrument(skip(self, params), fields(user = %params.user, relation = %params.relation))]
    pub async fn list_objects(
        &self,
        store_id: &str,
        params: ListObjectsParams,
    ) -> ServiceResult<ListObjectsResponse> {
        let mut request =
            ListObjectsRequest::new(store_id, params.user, params.relation, params.object_type);
        request.authorization_model_id = params.authorization_model_id;
        request.max_results = Some(self.inner.config.limits.max_list_objects);

        let result = self
            .pinned_resolver(store_id)
            .await?
            .list_objects(&request)
            .await?;
        info!(store_id, count = result.objects.len(), "list objects");
        Ok(ListObjectsResponse {
            objects: result.objects,
            truncated: result.truncated,
        })
    }

    #[instrument(skip(self, params), fields(object = %params.object, relation = %params.relation))]
    pub async fn list_users(
        &self,
        store_id: &str,
        params: ListUsersParams,
    ) -> ServiceResult<ListUsersResponse> {
        let mut request =
            ListUsersRequest::new(store_id, params.object, params.relation, params.user_type);
        request.user_relation = params.user_relation;
        request.authorization_model_id = params.authorization_model_id;

        let result = self
            .pinned_resolver(store_id)
            .await?
            .list_users(&request)
            .await?;
        info!(store_id, count = result.users.len(), "list users");
        Ok(ListUsersResponse {
            users: result.users,
        })
    }
}

/// Decomposes a validated tuple key into its stored form.
fn stored_tuple(tuple: &TupleKey) -> ServiceResult<StoredTuple> {
    let object = Object::parse(&tuple.object).map_err(|e| {
        ServiceError::validation_error(format!("invalid object '{}': {e}", tuple.object))
    })?;
    let user = User::parse(&tuple.user).map_err(|e| {
        ServiceError::validation_error(format!("invalid user '{}': {e}", tuple.user))
    })?;
    Ok(StoredTuple::new(
        object.object_type,
        object.object_id,
        tuple.relation.clone(),
        user.user_type,
        user.user_id,
        user.relation,
    ))
}

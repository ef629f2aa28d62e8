//! Graph resolver for permission checks.
//!
//! The resolver performs async graph traversal to determine
//! if a user has a specific permission on an object.
//!
//! # Evaluation Rules
//!
//! - **Sequential, declared order**: union children, userset tuples and
//!   tupleset parents are evaluated one after another and stop at the first
//!   grant. Intersection stops at the first denial; exclusion skips
//!   `subtract` when `base` denies.
//!
//! - **Cycle Detection**: Tracks visited `object#relation` nodes on the
//!   current path. Re-entering a node yields "not granted" rather than an
//!   error, so mutually nested groups resolve normally.
//!
//! - **Depth Limiting**: Default max depth of 25 matches OpenFGA behavior.
//!   Hitting it ends only the current path; the error surfaces when no
//!   other branch produced an answer.
//!
//! - **Deadline and Cancellation**: Every recursive step checks the
//!   request deadline and the caller's cancellation token, and the whole
//!   check runs under `tokio::time::timeout`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::error::{DomainError, DomainResult};
use crate::model::{Object, Relation, RelationDefinition, TypeSystem, User, Userset};

use super::cancellation::CancellationToken;
use super::config::ResolverConfig;
use super::context::TraversalContext;
use super::traits::{ModelReader, TupleReader};
use super::types::{
    CheckRequest, CheckResult, ListObjectsRequest, ListObjectsResult, ListUsersRequest,
    ListUsersResult, StoredTupleRef,
};

/// Type alias for boxed future to handle async recursion.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// State fixed for the duration of one resolution.
#[derive(Debug, Clone)]
struct CheckScope {
    store_id: String,
    user: User,
    model: Arc<TypeSystem>,
    budget: Duration,
    /// `None` when the budget reaches past what `Instant` can represent.
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl CheckScope {
    fn new(
        store_id: String,
        user: User,
        model: Arc<TypeSystem>,
        budget: Duration,
        cancellation: Option<CancellationToken>,
    ) -> Self {
        Self {
            store_id,
            user,
            model,
            budget,
            deadline: Instant::now().checked_add(budget),
            cancellation,
        }
    }

    fn for_user(&self, user: User) -> Self {
        Self {
            user,
            ..self.clone()
        }
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(DomainError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    fn timeout_error(&self) -> DomainError {
        DomainError::Timeout {
            duration_ms: self.budget.as_millis() as u64,
        }
    }

    /// Whether a tuple's subject is the requesting user.
    fn matches_subject(&self, tuple: &StoredTupleRef) -> bool {
        if tuple.user_type != self.user.user_type {
            return false;
        }
        if tuple.user_id == self.user.user_id && tuple.user_relation == self.user.relation {
            return true;
        }
        // `type:*` grants every concrete subject of that type
        tuple.is_wildcard() && tuple.user_relation.is_none() && !self.user.is_userset()
    }
}

/// Outcome of "any branch grants access" evaluation.
#[derive(Debug, Default)]
struct AnyBranch {
    denied: bool,
    terminated: Option<DomainError>,
}

impl AnyBranch {
    /// Records one branch. Returns `Ok(true)` when it grants access and
    /// propagates errors that are not path terminations.
    fn observe(&mut self, result: DomainResult<bool>) -> DomainResult<bool> {
        match result {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.denied = true;
                Ok(false)
            }
            Err(e) if e.is_path_termination() => {
                self.terminated = Some(e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn finish(self) -> DomainResult<bool> {
        match self.terminated {
            Some(e) if !self.denied => Err(e),
            _ => Ok(false),
        }
    }
}

/// Graph resolver for permission checks.
///
/// Performs async graph traversal to determine if a user has
/// a specific permission on an object.
pub struct GraphResolver<T, M> {
    tuple_reader: Arc<T>,
    model_reader: Arc<M>,
    config: ResolverConfig,
}

impl<T, M> GraphResolver<T, M>
where
    T: TupleReader + 'static,
    M: ModelReader + 'static,
{
    /// Creates a new graph resolver.
    pub fn new(tuple_reader: Arc<T>, model_reader: Arc<M>) -> Self {
        Self::with_config(tuple_reader, model_reader, ResolverConfig::default())
    }

    /// Creates a new graph resolver with custom configuration.
    pub fn with_config(tuple_reader: Arc<T>, model_reader: Arc<M>, config: ResolverConfig) -> Self {
        Self {
            tuple_reader,
            model_reader,
            config,
        }
    }

    /// Returns the resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Performs a permission check.
    ///
    /// # Errors
    ///
    /// - Format errors when the user, relation or object is malformed, or
    ///   names a type/relation the model does not define
    /// - `StoreNotFound` / `AuthorizationModelNotFound`
    /// - `DepthLimitExceeded`, `Timeout` or `Cancelled` when resolution is cut
    ///   short
    /// - `RelationNotFound` when a relation expression references a
    ///   relation missing from the model
    pub async fn check(&self, request: &CheckRequest) -> DomainResult<CheckResult> {
        let user = Self::parse_requesting_user(&request.user)?;
        let object = Self::parse_object(&request.object)?;
        Self::validate_relation(&request.relation)?;

        self.ensure_store(&request.store_id).await?;
        let model = self
            .model_reader
            .get_model(&request.store_id, request.authorization_model_id.as_deref())
            .await?;
        Self::ensure_relation_defined(&model, &object.object_type, &request.relation)?;
        Self::ensure_user_defined(&model, &user)?;

        let scope = Arc::new(CheckScope::new(
            request.store_id.clone(),
            user,
            model,
            request.timeout.unwrap_or(self.config.timeout),
            request.cancellation.clone(),
        ));

        let resolution = self.resolve_check(
            Arc::clone(&scope),
            object.object_type,
            object.object_id,
            request.relation.clone(),
            TraversalContext::new(),
        );
        let allowed = self.run_bounded(&scope, resolution).await?;

        debug!(
            store_id = %request.store_id,
            user = %request.user,
            relation = %request.relation,
            object = %request.object,
            allowed,
            "check resolved"
        );
        Ok(CheckResult { allowed })
    }

    /// Lists objects of a given type that a user has a specific relation to.
    ///
    /// Candidates are every object of the type that appears in a tuple; each
    /// is checked with the same deadline. Candidates whose resolution hits
    /// the depth limit are skipped. The result is sorted and capped at
    /// `max_results`.
    pub async fn list_objects(
        &self,
        request: &ListObjectsRequest,
    ) -> DomainResult<ListObjectsResult> {
        let user = Self::parse_requesting_user(&request.user)?;
        Self::validate_relation(&request.relation)?;

        self.ensure_store(&request.store_id).await?;
        let model = self
            .model_reader
            .get_model(&request.store_id, request.authorization_model_id.as_deref())
            .await?;
        Self::ensure_relation_defined(&model, &request.object_type, &request.relation)?;
        Self::ensure_user_defined(&model, &user)?;

        let scope = Arc::new(CheckScope::new(
            request.store_id.clone(),
            user,
            model,
            self.config.timeout,
            None,
        ));

        let candidates = self
            .tuple_reader
            .list_objects_by_type(&request.store_id, &request.object_type)
            .await?;

        let checks = stream::iter(candidates)
            .map(|object_id| {
                let scope = Arc::clone(&scope);
                let object_type = request.object_type.clone();
                let relation = request.relation.clone();
                async move {
                    let object = format!("{}:{}", object_type, object_id);
                    let result = self
                        .resolve_check(scope, object_type, object_id, relation, TraversalContext::new())
                        .await;
                    let allowed = Self::candidate_outcome(result, &object)?;
                    Ok::<_, DomainError>(allowed.then_some(object))
                }
            })
            .buffer_unordered(self.config.list_concurrency)
            .try_collect::<Vec<_>>();

        let mut objects: Vec<String> = self
            .run_bounded(&scope, checks)
            .await?
            .into_iter()
            .flatten()
            .collect();
        objects.sort();

        let truncated = match request.max_results {
            Some(max) if objects.len() > max => {
                objects.truncate(max);
                true
            }
            _ => false,
        };

        Ok(ListObjectsResult { objects, truncated })
    }

    /// Lists subjects of `user_type` (or `user_type#user_relation` usersets)
    /// that hold `relation` on `object`.
    ///
    /// Candidates are the matching subjects appearing in any tuple of the
    /// store; each is checked with the same deadline. The result is sorted.
    pub async fn list_users(&self, request: &ListUsersRequest) -> DomainResult<ListUsersResult> {
        let object = Self::parse_object(&request.object)?;
        Self::validate_relation(&request.relation)?;

        self.ensure_store(&request.store_id).await?;
        let model = self
            .model_reader
            .get_model(&request.store_id, request.authorization_model_id.as_deref())
            .await?;
        Self::ensure_relation_defined(&model, &object.object_type, &request.relation)?;
        if !model.has_type(&request.user_type) {
            return Err(DomainError::InvalidUserFormat {
                value: format!(
                    "type '{}' is not defined in the authorization model",
                    request.user_type
                ),
            });
        }
        if let Some(user_relation) = &request.user_relation {
            if !model.has_relation(&request.user_type, user_relation) {
                return Err(DomainError::InvalidRelationFormat {
                    value: format!(
                        "relation '{}' is not defined on type '{}'",
                        user_relation, request.user_type
                    ),
                });
            }
        }

        let candidates = self
            .tuple_reader
            .list_users_by_type(
                &request.store_id,
                &request.user_type,
                request.user_relation.as_deref(),
            )
            .await?;

        // Scope template; each candidate swaps in its own user.
        let base = CheckScope::new(
            request.store_id.clone(),
            User {
                user_type: request.user_type.clone(),
                user_id: String::new(),
                relation: request.user_relation.clone(),
            },
            model,
            self.config.timeout,
            None,
        );

        let checks = stream::iter(candidates.into_iter().filter_map(|candidate| {
            match User::parse(&candidate) {
                Ok(user) => Some((candidate, user)),
                Err(e) => {
                    warn!(candidate = %candidate, error = e, "skipping malformed stored subject");
                    None
                }
            }
        }))
        .map(|(candidate, user)| {
            let scope = Arc::new(base.for_user(user));
            let object_type = object.object_type.clone();
            let object_id = object.object_id.clone();
            let relation = request.relation.clone();
            async move {
                let result = self
                    .resolve_check(scope, object_type, object_id, relation, TraversalContext::new())
                    .await;
                let allowed = Self::candidate_outcome(result, &candidate)?;
                Ok::<_, DomainError>(allowed.then_some(candidate))
            }
        })
        .buffer_unordered(self.config.list_concurrency)
        .try_collect::<Vec<_>>();

        let mut users: Vec<String> = self
            .run_bounded(&base, checks)
            .await?
            .into_iter()
            .flatten()
            .collect();
        users.sort();

        Ok(ListUsersResult { users })
    }

    /// Runs a resolution under the scope's deadline and cancellation token.
    async fn run_bounded<F, R>(&self, scope: &CheckScope, resolution: F) -> DomainResult<R>
    where
        F: Future<Output = DomainResult<R>>,
    {
        let guarded = async {
            match &scope.cancellation {
                Some(token) => {
                    tokio::select! {
                        result = resolution => result,
                        _ = token.cancelled() => Err(DomainError::Cancelled),
                    }
                }
                None => resolution.await,
            }
        };

        match timeout(scope.budget, guarded).await {
            Ok(result) => result,
            Err(_) => Err(scope.timeout_error()),
        }
    }

    /// Maps a per-candidate result for list operations.
    fn candidate_outcome(result: DomainResult<bool>, candidate: &str) -> DomainResult<bool> {
        match result {
            Err(e) if e.is_path_termination() => {
                warn!(candidate = %candidate, error = %e, "skipping candidate");
                Ok(false)
            }
            other => other,
        }
    }

    /// Internal check resolution with traversal context (boxed for recursion).
    fn resolve_check(
        &self,
        scope: Arc<CheckScope>,
        object_type: String,
        object_id: String,
        relation: String,
        ctx: TraversalContext,
    ) -> BoxFuture<'_, DomainResult<bool>> {
        Box::pin(async move {
            scope.ensure_live()?;

            if ctx.depth >= self.config.max_depth {
                return Err(DomainError::DepthLimitExceeded {
                    max_depth: self.config.max_depth,
                });
            }

            let node = format!("{}:{}#{}", object_type, object_id, relation);
            if ctx.visited.contains(&node) {
                debug!(node = %node, user = %scope.user, "cycle detected, path not granted");
                return Ok(false);
            }

            let relation_def = scope.model.get_relation(&object_type, &relation)?;
            let ctx = ctx.with_visited(&node);
            let rewrite = relation_def.rewrite.clone();

            self.resolve_userset(scope, relation_def, rewrite, object_type, object_id, ctx)
                .await
        })
    }

    /// Resolves a userset rewrite (boxed for recursion).
    fn resolve_userset(
        &self,
        scope: Arc<CheckScope>,
        relation_def: Arc<RelationDefinition>,
        userset: Userset,
        object_type: String,
        object_id: String,
        ctx: TraversalContext,
    ) -> BoxFuture<'_, DomainResult<bool>> {
        Box::pin(async move {
            match userset {
                Userset::This => {
                    self.resolve_direct(&scope, &relation_def, &object_type, &object_id, &ctx)
                        .await
                }

                Userset::ComputedUserset { relation } => {
                    self.resolve_check(scope, object_type, object_id, relation, ctx.increment_depth())
                        .await
                }

                Userset::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    self.resolve_tuple_to_userset(
                        &scope,
                        &tupleset,
                        &computed_userset,
                        &object_type,
                        &object_id,
                        &ctx,
                    )
                    .await
                }

                Userset::Union { children } => {
                    let mut branches = AnyBranch::default();
                    for child in children {
                        let result = self
                            .resolve_userset(
                                Arc::clone(&scope),
                                Arc::clone(&relation_def),
                                child,
                                object_type.clone(),
                                object_id.clone(),
                                ctx.clone(),
                            )
                            .await;
                        if branches.observe(result)? {
                            return Ok(true);
                        }
                    }
                    branches.finish()
                }

                Userset::Intersection { children } => {
                    if children.is_empty() {
                        return Ok(false);
                    }
                    for child in children {
                        let granted = self
                            .resolve_userset(
                                Arc::clone(&scope),
                                Arc::clone(&relation_def),
                                child,
                                object_type.clone(),
                                object_id.clone(),
                                ctx.clone(),
                            )
                            .await?;
                        if !granted {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }

                Userset::Exclusion { base, subtract } => {
                    let granted = self
                        .resolve_userset(
                            Arc::clone(&scope),
                            Arc::clone(&relation_def),
                            *base,
                            object_type.clone(),
                            object_id.clone(),
                            ctx.clone(),
                        )
                        .await?;
                    if !granted {
                        return Ok(false);
                    }
                    let excluded = self
                        .resolve_userset(scope, relation_def, *subtract, object_type, object_id, ctx)
                        .await?;
                    Ok(!excluded)
                }
            }
        })
    }

    /// Resolves a direct tuple assignment.
    ///
    /// Tuples whose subject shape is not listed in the relation's type
    /// constraints are ignored, so a tuple written under an older model
    /// cannot grant access the current model forbids.
    async fn resolve_direct(
        &self,
        scope: &Arc<CheckScope>,
        relation_def: &RelationDefinition,
        object_type: &str,
        object_id: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<bool> {
        let tuples = self
            .tuple_reader
            .read_tuples(&scope.store_id, object_type, object_id, &relation_def.name)
            .await?;

        let permitted: Vec<StoredTupleRef> = tuples
            .into_iter()
            .filter(|t| {
                relation_def.type_constraints.iter().any(|c| {
                    c.allows_parts(&t.user_type, &t.user_id, t.user_relation.as_deref())
                })
            })
            .collect();

        if permitted.iter().any(|t| scope.matches_subject(t)) {
            return Ok(true);
        }

        let mut branches = AnyBranch::default();
        for tuple in permitted {
            let Some(user_relation) = tuple.user_relation else {
                continue;
            };
            if !scope.model.has_relation(&tuple.user_type, &user_relation) {
                continue;
            }
            let result = self
                .resolve_check(
                    Arc::clone(scope),
                    tuple.user_type,
                    tuple.user_id,
                    user_relation,
                    ctx.increment_depth(),
                )
                .await;
            if branches.observe(result)? {
                return Ok(true);
            }
        }
        branches.finish()
    }

    /// Resolves `computed` on every object related through `tupleset`.
    async fn resolve_tuple_to_userset(
        &self,
        scope: &Arc<CheckScope>,
        tupleset: &str,
        computed: &str,
        object_type: &str,
        object_id: &str,
        ctx: &TraversalContext,
    ) -> DomainResult<bool> {
        let parents = self
            .tuple_reader
            .read_tuples(&scope.store_id, object_type, object_id, tupleset)
            .await?;

        let mut branches = AnyBranch::default();
        for parent in parents {
            if parent.user_relation.is_some() || parent.is_wildcard() {
                continue;
            }
            if !scope.model.has_relation(&parent.user_type, computed) {
                continue;
            }
            let result = self
                .resolve_check(
                    Arc::clone(scope),
                    parent.user_type,
                    parent.user_id,
                    computed.to_string(),
                    ctx.increment_depth(),
                )
                .await;
            if branches.observe(result)? {
                return Ok(true);
            }
        }
        branches.finish()
    }

    async fn ensure_store(&self, store_id: &str) -> DomainResult<()> {
        if self.tuple_reader.store_exists(store_id).await? {
            Ok(())
        } else {
            Err(DomainError::StoreNotFound {
                store_id: store_id.to_string(),
            })
        }
    }

    fn parse_requesting_user(value: &str) -> DomainResult<User> {
        let user = User::parse(value).map_err(|e| DomainError::InvalidUserFormat {
            value: format!("{}: {}", value, e),
        })?;
        if user.is_wildcard() {
            return Err(DomainError::InvalidUserFormat {
                value: format!("{}: wildcard cannot be the requesting user", value),
            });
        }
        Ok(user)
    }

    fn parse_object(value: &str) -> DomainResult<Object> {
        Object::parse(value).map_err(|e| DomainError::InvalidObjectFormat {
            value: format!("{}: {}", value, e),
        })
    }

    fn validate_relation(value: &str) -> DomainResult<()> {
        Relation::new(value)
            .map(|_| ())
            .map_err(|e| DomainError::InvalidRelationFormat {
                value: format!("{}: {}", value, e),
            })
    }

    /// Rejects requests naming a type or relation the model lacks.
    fn ensure_relation_defined(
        model: &TypeSystem,
        object_type: &str,
        relation: &str,
    ) -> DomainResult<()> {
        match model.get_relation(object_type, relation) {
            Ok(_) => Ok(()),
            Err(DomainError::TypeNotFound { type_name }) => Err(DomainError::InvalidObjectFormat {
                value: format!(
                    "type '{}' is not defined in the authorization model",
                    type_name
                ),
            }),
            Err(DomainError::RelationNotFound {
                type_name,
                relation,
            }) => Err(DomainError::InvalidRelationFormat {
                value: format!(
                    "relation '{}' is not defined on type '{}'",
                    relation, type_name
                ),
            }),
            Err(e) => Err(e),
        }
    }

    fn ensure_user_defined(model: &TypeSystem, user: &User) -> DomainResult<()> {
        if !model.has_type(&user.user_type) {
            return Err(DomainError::InvalidUserFormat {
                value: format!(
                    "type '{}' is not defined in the authorization model",
                    user.user_type
                ),
            });
        }
        if let Some(relation) = &user.relation {
            if !model.has_relation(&user.user_type, relation) {
                return Err(DomainError::InvalidUserFormat {
                    value: format!(
                        "relation '{}' is not defined on type '{}'",
                        relation, user.user_type
                    ),
                });
            }
        }
        Ok(())
    }
}

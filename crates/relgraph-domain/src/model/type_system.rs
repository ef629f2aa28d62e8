//! Type system for authorization model lookups with caching.
//!
//! The `TypeSystem` provides efficient lookups for types and relations
//! with internal caching using `DashMap` for thread-safe concurrent access.
//! A published model never changes, so cached entries are never invalidated.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{DomainError, DomainResult};

use super::types::{
    AuthorizationModel, Object, Relation, RelationDefinition, Tuple, TypeDefinition, User,
};

/// Type system providing cached access to authorization model types and relations.
///
/// # Thread Safety
///
/// The `TypeSystem` is thread-safe and can be shared across async tasks
/// behind an `Arc`. Lookups never take a lock beyond a `DashMap` shard.
///
/// # Example
///
/// ```ignore
/// use relgraph_domain::model::{parse_model, TypeSystem};
///
/// let type_system = TypeSystem::new(parse_model(json)?);
/// let editor = type_system.get_relation("document", "editor")?;
/// ```
#[derive(Debug)]
pub struct TypeSystem {
    /// The underlying authorization model.
    model: Arc<AuthorizationModel>,
    /// Cache for type definitions, keyed by type name.
    type_cache: DashMap<String, Arc<TypeDefinition>>,
    /// Cache for relation definitions, keyed by "type_name:relation_name".
    relation_cache: DashMap<String, Arc<RelationDefinition>>,
}

impl TypeSystem {
    /// Creates a new `TypeSystem` from an authorization model.
    ///
    /// The type system will lazily cache lookups as they are accessed.
    pub fn new(model: AuthorizationModel) -> Self {
        Self {
            model: Arc::new(model),
            type_cache: DashMap::new(),
            relation_cache: DashMap::new(),
        }
    }

    /// Returns a reference to the underlying authorization model.
    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    /// Gets a type definition by name, using the cache if available.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist in the model.
    pub fn get_type(&self, type_name: &str) -> DomainResult<Arc<TypeDefinition>> {
        if let Some(cached) = self.type_cache.get(type_name) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self
            .model
            .type_definition(type_name)
            .ok_or_else(|| DomainError::TypeNotFound {
                type_name: type_name.to_string(),
            })?;

        let type_def = Arc::new(type_def.clone());
        self.type_cache
            .insert(type_name.to_string(), Arc::clone(&type_def));
        Ok(type_def)
    }

    /// Gets a relation definition for a specific type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist.
    /// Returns `DomainError::RelationNotFound` if the relation does not exist on the type.
    pub fn get_relation(
        &self,
        type_name: &str,
        relation: &str,
    ) -> DomainResult<Arc<RelationDefinition>> {
        let cache_key = format!("{}:{}", type_name, relation);

        if let Some(cached) = self.relation_cache.get(&cache_key) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self.get_type(type_name)?;
        let relation_def =
            type_def
                .relation(relation)
                .ok_or_else(|| DomainError::RelationNotFound {
                    type_name: type_name.to_string(),
                    relation: relation.to_string(),
                })?;

        let relation_def = Arc::new(relation_def.clone());
        self.relation_cache
            .insert(cache_key, Arc::clone(&relation_def));
        Ok(relation_def)
    }

    /// Checks if a type exists in the model.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.get_type(type_name).is_ok()
    }

    /// Checks if a relation exists on a type.
    pub fn has_relation(&self, type_name: &str, relation: &str) -> bool {
        self.get_relation(type_name, relation).is_ok()
    }

    /// Validates a tuple for writing under this model.
    ///
    /// Checks that:
    /// - The user, relation and object are well formed
    /// - The object type exists and defines the relation
    /// - The relation is directly assignable
    /// - The user's shape is listed in the relation's type constraints
    /// - A userset user names a relation defined on its type
    ///
    /// # Errors
    ///
    /// Returns a format error for malformed identifiers and
    /// `DomainError::InvalidTuple` for tuples the model does not allow.
    pub fn validate_tuple(&self, tuple: &Tuple) -> DomainResult<()> {
        let object =
            Object::parse(&tuple.object).map_err(|e| DomainError::InvalidObjectFormat {
                value: format!("{}: {}", tuple.object, e),
            })?;
        Relation::new(tuple.relation.as_str()).map_err(|e| DomainError::InvalidRelationFormat {
            value: format!("{}: {}", tuple.relation, e),
        })?;
        let user = User::parse(&tuple.user).map_err(|e| DomainError::InvalidUserFormat {
            value: format!("{}: {}", tuple.user, e),
        })?;

        let invalid = |reason: String| DomainError::InvalidTuple {
            tuple: tuple.to_string(),
            reason,
        };

        let relation_def = self
            .get_relation(&object.object_type, &tuple.relation)
            .map_err(|e| invalid(e.to_string()))?;

        if !relation_def.is_directly_assignable() {
            return Err(invalid(format!(
                "relation '{}' on type '{}' is not directly assignable",
                tuple.relation, object.object_type
            )));
        }

        self.get_type(&user.user_type)
            .map_err(|e| invalid(e.to_string()))?;
        if let Some(user_relation) = &user.relation {
            self.get_relation(&user.user_type, user_relation)
                .map_err(|e| invalid(e.to_string()))?;
        }

        if !relation_def.allows_user(&user) {
            let allowed: Vec<String> = relation_def
                .type_constraints
                .iter()
                .map(ToString::to_string)
                .collect();
            return Err(invalid(format!(
                "'{}' is not an allowed type for {}#{} (allowed: [{}])",
                tuple.user,
                object.object_type,
                tuple.relation,
                allowed.join(", ")
            )));
        }

        Ok(())
    }

    /// Returns the number of cached type definitions.
    pub fn type_cache_size(&self) -> usize {
        self.type_cache.len()
    }

    /// Returns the number of cached relation definitions.
    pub fn relation_cache_size(&self) -> usize {
        self.relation_cache.len()
    }
}

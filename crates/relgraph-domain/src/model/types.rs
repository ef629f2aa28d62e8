//! Core type definitions for the authorization model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier value used for wildcard subjects (`user:*`).
pub const WILDCARD: &str = "*";

/// A subject identifier: `user:alice`, `team:eng#member` or `user:*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// The type portion (e.g., "user").
    pub user_type: String,
    /// The ID portion, or `*` for a wildcard.
    pub user_id: String,
    /// The relation of a userset subject (e.g., "member").
    pub relation: Option<String>,
}

impl User {
    /// Parses a subject from `type:id`, `type:id#relation` or `type:*`.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (user_type, rest) = value
            .split_once(':')
            .ok_or("user must be in 'type:id' or 'type:id#relation' format")?;
        if user_type.is_empty() {
            return Err("user type cannot be empty");
        }
        if !is_identifier(user_type) {
            return Err("user type contains invalid characters");
        }

        let (user_id, relation) = match rest.split_once('#') {
            Some((id, relation)) => {
                if relation.is_empty() || !is_identifier(relation) {
                    return Err("userset relation is invalid");
                }
                (id, Some(relation.to_string()))
            }
            None => (rest, None),
        };

        if user_id.is_empty() {
            return Err("user id cannot be empty");
        }
        if user_id.contains(char::is_whitespace) || user_id.contains(':') {
            return Err("user id contains invalid characters");
        }
        if user_id == WILDCARD && relation.is_some() {
            return Err("wildcard users cannot carry a relation");
        }

        Ok(Self {
            user_type: user_type.to_string(),
            user_id: user_id.to_string(),
            relation,
        })
    }

    /// Whether this is a `type:*` wildcard subject.
    pub fn is_wildcard(&self) -> bool {
        self.user_id == WILDCARD
    }

    /// Whether this is a `type:id#relation` subject.
    pub fn is_userset(&self) -> bool {
        self.relation.is_some()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}:{}#{}", self.user_type, self.user_id, relation),
            None => write!(f, "{}:{}", self.user_type, self.user_id),
        }
    }
}

/// An object identifier (e.g., "document:readme").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Object {
    /// The type portion (e.g., "document").
    pub object_type: String,
    /// The ID portion (e.g., "readme").
    pub object_id: String,
}

impl Object {
    /// Creates a new Object from type and ID.
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }

    /// Parses an object from "type:id" format.
    pub fn parse(value: &str) -> Result<Self, &'static str> {
        let (object_type, object_id) = value
            .split_once(':')
            .ok_or("object must be in 'type:id' format")?;
        if object_type.is_empty() || object_id.is_empty() {
            return Err("object type and id cannot be empty");
        }
        if !is_identifier(object_type) {
            return Err("object type contains invalid characters");
        }
        if object_id == WILDCARD {
            return Err("object id cannot be a wildcard");
        }
        if object_id.contains(['#', ':']) || object_id.contains(char::is_whitespace) {
            return Err("object id contains invalid characters");
        }
        Ok(Self::new(object_type, object_id))
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// A relation name (e.g., "viewer", "editor", "owner").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation(String);

impl Relation {
    /// Creates a new Relation from a string.
    pub fn new(value: impl Into<String>) -> Result<Self, &'static str> {
        let value = value.into();
        if value.is_empty() {
            return Err("relation cannot be empty");
        }
        if !is_identifier(&value) {
            return Err("relation contains invalid characters");
        }
        Ok(Self(value))
    }

    /// Returns the relation as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A tuple representing a relationship (user, relation, object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    /// The user (subject) of the relationship.
    pub user: String,
    /// The relation between user and object.
    pub relation: String,
    /// The object of the relationship.
    pub object: String,
}

impl Tuple {
    /// Creates a new Tuple.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// An authorization model defining types and their relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationModel {
    /// Schema version (e.g., "1.1").
    pub schema_version: String,
    /// Type definitions in the model.
    pub type_definitions: Vec<TypeDefinition>,
}

impl AuthorizationModel {
    /// Creates an empty model with the given schema version.
    pub fn new(schema_version: impl Into<String>) -> Self {
        Self {
            schema_version: schema_version.into(),
            type_definitions: Vec::new(),
        }
    }

    /// Creates a model with the given schema version and type definitions.
    pub fn with_types(
        schema_version: impl Into<String>,
        type_definitions: Vec<TypeDefinition>,
    ) -> Self {
        Self {
            schema_version: schema_version.into(),
            type_definitions,
        }
    }

    /// Finds a type definition by name.
    pub fn type_definition(&self, type_name: &str) -> Option<&TypeDefinition> {
        self.type_definitions
            .iter()
            .find(|td| td.type_name == type_name)
    }
}

/// A type definition within the authorization model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// The type name (e.g., "document", "folder").
    pub type_name: String,
    /// Relations defined on this type.
    pub relations: Vec<RelationDefinition>,
}

impl TypeDefinition {
    /// Creates a type without relations.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relations: Vec::new(),
        }
    }

    /// Adds a relation definition.
    pub fn with_relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    /// Finds a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// A relation definition on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    /// The relation name.
    pub name: String,
    /// Subject shapes allowed in tuples written directly to this relation.
    pub type_constraints: Vec<TypeConstraint>,
    /// The userset rewrite for this relation.
    pub rewrite: Userset,
}

impl RelationDefinition {
    /// Creates a relation definition.
    pub fn new(
        name: impl Into<String>,
        type_constraints: Vec<TypeConstraint>,
        rewrite: Userset,
    ) -> Self {
        Self {
            name: name.into(),
            type_constraints,
            rewrite,
        }
    }

    /// Whether tuples may be written directly to this relation.
    pub fn is_directly_assignable(&self) -> bool {
        self.rewrite.contains_this()
    }

    /// Whether `user` is an allowed subject shape for direct tuples.
    pub fn allows_user(&self, user: &User) -> bool {
        self.type_constraints.iter().any(|c| c.allows(user))
    }
}

/// One entry of a relation's `directly_related_user_types`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeConstraint {
    /// The allowed subject type.
    pub type_name: String,
    /// Userset relation for `type#relation` entries.
    pub relation: Option<String>,
    /// Whether this entry is the `type:*` wildcard.
    pub wildcard: bool,
}

impl TypeConstraint {
    /// Allows concrete subjects of `type_name`.
    pub fn direct(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
            wildcard: false,
        }
    }

    /// Allows `type_name:id#relation` subjects.
    pub fn userset(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: Some(relation.into()),
            wildcard: false,
        }
    }

    /// Allows the `type_name:*` subject.
    pub fn wildcard(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: None,
            wildcard: true,
        }
    }

    /// Whether a tuple with this subject satisfies the constraint.
    pub fn allows(&self, user: &User) -> bool {
        self.allows_parts(&user.user_type, &user.user_id, user.relation.as_deref())
    }

    /// Same as [`TypeConstraint::allows`] for a subject given in parts.
    pub fn allows_parts(&self, user_type: &str, user_id: &str, relation: Option<&str>) -> bool {
        if user_type != self.type_name {
            return false;
        }
        if self.wildcard {
            return user_id == WILDCARD && relation.is_none();
        }
        if user_id == WILDCARD {
            return false;
        }
        self.relation.as_deref() == relation
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.relation, self.wildcard) {
            (_, true) => write!(f, "{}:*", self.type_name),
            (Some(relation), false) => write!(f, "{}#{}", self.type_name, relation),
            (None, false) => f.write_str(&self.type_name),
        }
    }
}

/// A userset defines how a relation is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Userset {
    /// Direct assignment (this).
    This,
    /// Computed userset from another relation.
    ComputedUserset { relation: String },
    /// Tuple to userset (relation from parent).
    TupleToUserset {
        tupleset: String,
        computed_userset: String,
    },
    /// Union of multiple usersets.
    Union { children: Vec<Userset> },
    /// Intersection of multiple usersets.
    Intersection { children: Vec<Userset> },
    /// Exclusion (base but not subtract).
    Exclusion {
        base: Box<Userset>,
        subtract: Box<Userset>,
    },
}

impl Userset {
    /// Whether `This` appears anywhere in the expression.
    pub fn contains_this(&self) -> bool {
        match self {
            Userset::This => true,
            Userset::ComputedUserset { .. } | Userset::TupleToUserset { .. } => false,
            Userset::Union { children } | Userset::Intersection { children } => {
                children.iter().any(Userset::contains_this)
            }
            Userset::Exclusion { base, subtract } => base.contains_this() || subtract.contains_this(),
        }
    }
}

/// Identifiers used for type and relation names: ASCII alphanumerics plus
/// `_` and `-`.
fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

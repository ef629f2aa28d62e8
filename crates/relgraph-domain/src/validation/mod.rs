//! Authorization model validation.
//!
//! Validates that authorization models are semantically correct before they
//! are published:
//! - The schema version is supported and the model is not empty
//! - All referenced types and relations exist
//! - `directly_related_user_types` agrees with the rewrite expressions
//! - Tupleset relations are plain, directly assigned object references
//! - No cyclic computed-userset definitions inside a type

use std::collections::{HashMap, HashSet};

use crate::error::DomainError;
use crate::model::{AuthorizationModel, RelationDefinition, TypeConstraint, TypeDefinition, Userset};

/// The only schema version this engine evaluates.
pub const SUPPORTED_SCHEMA_VERSION: &str = "1.1";

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Empty model (no type definitions)
    EmptyModel,
    /// Schema version other than 1.1
    UnsupportedSchemaVersion { version: String },
    /// The same type is defined twice
    DuplicateType { type_name: String },
    /// A relation definition contains a cycle
    CyclicRelation {
        type_name: String,
        relation_name: String,
        cycle_path: Vec<String>,
    },
    /// A referenced relation does not exist
    UndefinedRelation {
        type_name: String,
        relation_name: String,
        referenced_relation: String,
    },
    /// Type constraint references an undefined type or relation
    InvalidTypeConstraint {
        type_name: String,
        relation_name: String,
        invalid_type: String,
    },
    /// The rewrite allows direct tuples but no user types are listed
    MissingDirectlyRelatedTypes {
        type_name: String,
        relation_name: String,
    },
    /// User types are listed but the rewrite never reads direct tuples
    UnexpectedDirectlyRelatedTypes {
        type_name: String,
        relation_name: String,
    },
    /// A tupleset relation is not a plain direct relation to objects
    InvalidTupleset {
        type_name: String,
        relation_name: String,
        tupleset: String,
    },
    /// No type reachable through the tupleset defines the computed relation
    UnresolvableTupleToUserset {
        type_name: String,
        relation_name: String,
        tupleset: String,
        computed_relation: String,
    },
    /// A union or intersection without children
    EmptySetOperation {
        type_name: String,
        relation_name: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyModel => {
                write!(f, "model must have at least one type definition")
            }
            ValidationError::UnsupportedSchemaVersion { version } => write!(
                f,
                "unsupported schema version '{}' (expected '{}')",
                version, SUPPORTED_SCHEMA_VERSION
            ),
            ValidationError::DuplicateType { type_name } => {
                write!(f, "type '{}' is defined more than once", type_name)
            }
            ValidationError::CyclicRelation {
                type_name,
                relation_name,
                cycle_path,
            } => write!(
                f,
                "cyclic relation definition in {}#{}: {}",
                type_name,
                relation_name,
                cycle_path.join(" -> ")
            ),
            ValidationError::UndefinedRelation {
                type_name,
                relation_name,
                referenced_relation,
            } => write!(
                f,
                "undefined relation '{}' referenced in {}#{}",
                referenced_relation, type_name, relation_name
            ),
            ValidationError::InvalidTypeConstraint {
                type_name,
                relation_name,
                invalid_type,
            } => write!(
                f,
                "invalid type constraint '{}' in {}#{}",
                invalid_type, type_name, relation_name
            ),
            ValidationError::MissingDirectlyRelatedTypes {
                type_name,
                relation_name,
            } => write!(
                f,
                "{}#{} accepts direct tuples but lists no directly related user types",
                type_name, relation_name
            ),
            ValidationError::UnexpectedDirectlyRelatedTypes {
                type_name,
                relation_name,
            } => write!(
                f,
                "{}#{} lists directly related user types but its rewrite has no 'this'",
                type_name, relation_name
            ),
            ValidationError::InvalidTupleset {
                type_name,
                relation_name,
                tupleset,
            } => write!(
                f,
                "tupleset '{}' used in {}#{} must be a direct relation to objects",
                tupleset, type_name, relation_name
            ),
            ValidationError::UnresolvableTupleToUserset {
                type_name,
                relation_name,
                tupleset,
                computed_relation,
            } => write!(
                f,
                "no type related through '{}' defines '{}' (referenced in {}#{})",
                tupleset, computed_relation, type_name, relation_name
            ),
            ValidationError::EmptySetOperation {
                type_name,
                relation_name,
            } => write!(
                f,
                "empty union or intersection in {}#{}",
                type_name, relation_name
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Model validator
pub struct ModelValidator<'a> {
    /// Type definitions by name
    types: HashMap<&'a str, &'a TypeDefinition>,
}

impl<'a> ModelValidator<'a> {
    /// Create a new validator for the given model
    pub fn new(model: &'a AuthorizationModel) -> Self {
        let types = model
            .type_definitions
            .iter()
            .map(|td| (td.type_name.as_str(), td))
            .collect();
        Self { types }
    }

    /// Validate the model and return any errors found
    pub fn validate(&self, model: &AuthorizationModel) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if model.type_definitions.is_empty() {
            errors.push(ValidationError::EmptyModel);
            return Err(errors);
        }

        if model.schema_version != SUPPORTED_SCHEMA_VERSION {
            errors.push(ValidationError::UnsupportedSchemaVersion {
                version: model.schema_version.clone(),
            });
        }

        let mut seen = HashSet::new();
        for type_def in &model.type_definitions {
            if !seen.insert(type_def.type_name.as_str()) {
                errors.push(ValidationError::DuplicateType {
                    type_name: type_def.type_name.clone(),
                });
            }
        }

        for type_def in &model.type_definitions {
            self.validate_type_definition(type_def, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a single type definition
    fn validate_type_definition(
        &self,
        type_def: &TypeDefinition,
        errors: &mut Vec<ValidationError>,
    ) {
        for relation_def in &type_def.relations {
            self.validate_type_constraints(&type_def.type_name, relation_def, errors);
            self.validate_userset(
                type_def,
                &relation_def.name,
                &relation_def.rewrite,
                errors,
            );
        }

        if let Some((relation_name, cycle_path)) = Self::detect_cycle_in_type(type_def) {
            errors.push(ValidationError::CyclicRelation {
                type_name: type_def.type_name.clone(),
                relation_name,
                cycle_path,
            });
        }
    }

    /// Validate `directly_related_user_types` and its agreement with the rewrite
    fn validate_type_constraints(
        &self,
        type_name: &str,
        relation_def: &RelationDefinition,
        errors: &mut Vec<ValidationError>,
    ) {
        let assignable = relation_def.is_directly_assignable();
        if assignable && relation_def.type_constraints.is_empty() {
            errors.push(ValidationError::MissingDirectlyRelatedTypes {
                type_name: type_name.to_string(),
                relation_name: relation_def.name.clone(),
            });
        }
        if !assignable && !relation_def.type_constraints.is_empty() {
            errors.push(ValidationError::UnexpectedDirectlyRelatedTypes {
                type_name: type_name.to_string(),
                relation_name: relation_def.name.clone(),
            });
        }

        for constraint in &relation_def.type_constraints {
            let valid = match &constraint.relation {
                Some(relation) => self.relation_exists(&constraint.type_name, relation),
                None => self.type_exists(&constraint.type_name),
            };
            if !valid {
                errors.push(ValidationError::InvalidTypeConstraint {
                    type_name: type_name.to_string(),
                    relation_name: relation_def.name.clone(),
                    invalid_type: constraint.to_string(),
                });
            }
        }
    }

    /// Validate a userset expression
    fn validate_userset(
        &self,
        type_def: &TypeDefinition,
        relation_name: &str,
        userset: &Userset,
        errors: &mut Vec<ValidationError>,
    ) {
        let type_name = &type_def.type_name;
        match userset {
            Userset::This => {}
            Userset::ComputedUserset { relation } => {
                if type_def.relation(relation).is_none() {
                    errors.push(ValidationError::UndefinedRelation {
                        type_name: type_name.clone(),
                        relation_name: relation_name.to_string(),
                        referenced_relation: relation.clone(),
                    });
                }
            }
            Userset::TupleToUserset {
                tupleset,
                computed_userset,
            } => {
                let Some(tupleset_def) = type_def.relation(tupleset) else {
                    errors.push(ValidationError::UndefinedRelation {
                        type_name: type_name.clone(),
                        relation_name: relation_name.to_string(),
                        referenced_relation: tupleset.clone(),
                    });
                    return;
                };

                if tupleset_def.rewrite != Userset::This
                    || tupleset_def
                        .type_constraints
                        .iter()
                        .any(|c| c.relation.is_some())
                {
                    errors.push(ValidationError::InvalidTupleset {
                        type_name: type_name.clone(),
                        relation_name: relation_name.to_string(),
                        tupleset: tupleset.clone(),
                    });
                    return;
                }

                let resolvable = tupleset_def
                    .type_constraints
                    .iter()
                    .filter(|c: &&TypeConstraint| !c.wildcard)
                    .any(|c| self.relation_exists(&c.type_name, computed_userset));
                if !resolvable {
                    errors.push(ValidationError::UnresolvableTupleToUserset {
                        type_name: type_name.clone(),
                        relation_name: relation_name.to_string(),
                        tupleset: tupleset.clone(),
                        computed_relation: computed_userset.clone(),
                    });
                }
            }
            Userset::Union { children } | Userset::Intersection { children } => {
                if children.is_empty() {
                    errors.push(ValidationError::EmptySetOperation {
                        type_name: type_name.clone(),
                        relation_name: relation_name.to_string(),
                    });
                }
                for child in children {
                    self.validate_userset(type_def, relation_name, child, errors);
                }
            }
            Userset::Exclusion { base, subtract } => {
                self.validate_userset(type_def, relation_name, base, errors);
                self.validate_userset(type_def, relation_name, subtract, errors);
            }
        }
    }

    /// Check if a type exists in the model
    pub fn type_exists(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Check if a relation exists on a type
    pub fn relation_exists(&self, type_name: &str, relation_name: &str) -> bool {
        self.types
            .get(type_name)
            .is_some_and(|td| td.relation(relation_name).is_some())
    }

    /// Detect cycles in relation definitions using DFS
    fn detect_cycle_in_type(type_def: &TypeDefinition) -> Option<(String, Vec<String>)> {
        let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
        for rel_def in &type_def.relations {
            let mut refs = HashSet::new();
            collect_referenced_relations(&rel_def.rewrite, &mut refs);
            graph.insert(rel_def.name.clone(), refs);
        }

        // Visit in declaration order so the reported cycle is deterministic
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for rel_def in &type_def.relations {
            if dfs_cycle_detect(&rel_def.name, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Some((rel_def.name.clone(), path));
            }
        }
        None
    }
}

/// Collect all referenced relations from a userset expression
fn collect_referenced_relations(userset: &Userset, refs: &mut HashSet<String>) {
    match userset {
        Userset::This => {}
        Userset::ComputedUserset { relation } => {
            refs.insert(relation.clone());
        }
        Userset::TupleToUserset { .. } => {
            // Tuple to userset goes to a different object, no local cycle
        }
        Userset::Union { children } | Userset::Intersection { children } => {
            for child in children {
                collect_referenced_relations(child, refs);
            }
        }
        Userset::Exclusion { base, subtract } => {
            collect_referenced_relations(base, refs);
            collect_referenced_relations(subtract, refs);
        }
    }
}

/// DFS-based cycle detection in relation graph
fn dfs_cycle_detect(
    node: &str,
    graph: &HashMap<String, HashSet<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    if rec_stack.contains(node) {
        path.push(node.to_string());
        return true;
    }
    if visited.contains(node) {
        return false;
    }

    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(neighbors) = graph.get(node) {
        let mut neighbors: Vec<&String> = neighbors.iter().collect();
        neighbors.sort();
        for neighbor in neighbors {
            // Only follow edges to relations that exist in this type
            if graph.contains_key(neighbor.as_str())
                && dfs_cycle_detect(neighbor, graph, visited, rec_stack, path)
            {
                return true;
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

/// Validate an authorization model
pub fn validate(model: &AuthorizationModel) -> ValidationResult<()> {
    let validator = ModelValidator::new(model);
    validator.validate(model)
}

/// Validate an authorization model, folding every problem into one
/// `DomainError::ModelValidationError`.
pub fn validate_model(model: &AuthorizationModel) -> Result<(), DomainError> {
    validate(model).map_err(|errors| DomainError::ModelValidationError {
        message: errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    })
}

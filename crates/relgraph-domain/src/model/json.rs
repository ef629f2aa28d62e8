//! JSON codec for authorization models.
//!
//! Accepts the OpenFGA `WriteAuthorizationModel` body format:
//!
//! ```json
//! {
//!   "schema_version": "1.1",
//!   "type_definitions": [
//!     {
//!       "type": "document",
//!       "relations": {
//!         "owner": { "this": {} },
//!         "editor": { "union": { "child": [ { "this": {} }, { "computedUserset": { "relation": "owner" } } ] } }
//!       },
//!       "metadata": {
//!         "relations": {
//!           "owner": { "directly_related_user_types": [ { "type": "user" } ] },
//!           "editor": { "directly_related_user_types": [ { "type": "team", "relation": "member" } ] }
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Relations are emitted in name order, so `parse_model(&to_json(m)?)`
//! yields a model equal to `m` whenever `m` itself came from `parse_model`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, DomainResult};

use super::types::{AuthorizationModel, RelationDefinition, TypeConstraint, TypeDefinition, Userset};

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    schema_version: String,
    #[serde(default)]
    type_definitions: Vec<TypeDefinitionDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TypeDefinitionDocument {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    relations: Option<BTreeMap<String, UsersetDocument>>,
    #[serde(default)]
    metadata: Option<MetadataDocument>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    relations: Option<BTreeMap<String, RelationMetadataDocument>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RelationMetadataDocument {
    #[serde(default)]
    directly_related_user_types: Vec<RelationReferenceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RelationReferenceDocument {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wildcard: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UsersetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    this: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    computed_userset: Option<ObjectRelationDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tuple_to_userset: Option<TupleToUsersetDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    union: Option<UsersetsDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intersection: Option<UsersetsDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difference: Option<DifferenceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectRelationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    relation: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TupleToUsersetDocument {
    tupleset: ObjectRelationDocument,
    computed_userset: ObjectRelationDocument,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsersetsDocument {
    #[serde(default)]
    child: Vec<UsersetDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DifferenceDocument {
    base: Box<UsersetDocument>,
    subtract: Box<UsersetDocument>,
}

/// Parses an authorization model from its JSON document.
///
/// Only structural problems are reported here; semantic checks live in
/// [`crate::validation`].
///
/// # Errors
///
/// Returns `DomainError::ModelParseError` for malformed JSON, an unknown or
/// ambiguous userset shape, or metadata for an undefined relation.
pub fn parse_model(json: &str) -> DomainResult<AuthorizationModel> {
    let document: ModelDocument =
        serde_json::from_str(json).map_err(|e| DomainError::ModelParseError {
            message: e.to_string(),
        })?;

    let type_definitions = document
        .type_definitions
        .into_iter()
        .map(type_definition_from_document)
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(AuthorizationModel {
        schema_version: document.schema_version,
        type_definitions,
    })
}

/// Renders an authorization model as its JSON document.
pub fn to_json(model: &AuthorizationModel) -> DomainResult<String> {
    let document = ModelDocument {
        schema_version: model.schema_version.clone(),
        type_definitions: model
            .type_definitions
            .iter()
            .map(type_definition_to_document)
            .collect(),
    };
    serde_json::to_string(&document).map_err(|e| DomainError::ModelParseError {
        message: e.to_string(),
    })
}

fn type_definition_from_document(doc: TypeDefinitionDocument) -> DomainResult<TypeDefinition> {
    let type_name = doc.type_name;
    let mut metadata = doc
        .metadata
        .and_then(|m| m.relations)
        .unwrap_or_default();

    let mut relations = Vec::new();
    for (name, userset_doc) in doc.relations.unwrap_or_default() {
        let rewrite = userset_from_document(userset_doc, &type_name, &name)?;
        let type_constraints = metadata
            .remove(&name)
            .unwrap_or_default()
            .directly_related_user_types
            .into_iter()
            .map(|r| type_constraint_from_document(r, &type_name, &name))
            .collect::<DomainResult<Vec<_>>>()?;
        relations.push(RelationDefinition {
            name,
            type_constraints,
            rewrite,
        });
    }

    if let Some(orphan) = metadata.keys().next() {
        return Err(DomainError::ModelParseError {
            message: format!(
                "type '{}' has metadata for undefined relation '{}'",
                type_name, orphan
            ),
        });
    }

    Ok(TypeDefinition {
        type_name,
        relations,
    })
}

fn type_constraint_from_document(
    doc: RelationReferenceDocument,
    type_name: &str,
    relation: &str,
) -> DomainResult<TypeConstraint> {
    match (doc.relation, doc.wildcard.is_some()) {
        (Some(_), true) => Err(DomainError::ModelParseError {
            message: format!(
                "{}#{}: type restriction '{}' cannot be both a userset and a wildcard",
                type_name, relation, doc.type_name
            ),
        }),
        (Some(userset_relation), false) => {
            Ok(TypeConstraint::userset(doc.type_name, userset_relation))
        }
        (None, true) => Ok(TypeConstraint::wildcard(doc.type_name)),
        (None, false) => Ok(TypeConstraint::direct(doc.type_name)),
    }
}

/// Takes the relation of an `{object, relation}` reference. References are
/// always relative to the object being evaluated, so `object` must be empty.
fn local_relation(
    doc: ObjectRelationDocument,
    type_name: &str,
    relation: &str,
) -> DomainResult<String> {
    match doc.object.as_deref() {
        None | Some("") => Ok(doc.relation),
        Some(object) => Err(DomainError::ModelParseError {
            message: format!(
                "{type_name}#{relation}: reference to '{}' cannot name an object ('{object}')",
                doc.relation
            ),
        }),
    }
}

fn userset_from_document(
    doc: UsersetDocument,
    type_name: &str,
    relation: &str,
) -> DomainResult<Userset> {
    let UsersetDocument {
        this,
        computed_userset,
        tuple_to_userset,
        union,
        intersection,
        difference,
    } = doc;

    let set = [
        this.is_some(),
        computed_userset.is_some(),
        tuple_to_userset.is_some(),
        union.is_some(),
        intersection.is_some(),
        difference.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();
    if set != 1 {
        return Err(DomainError::ModelParseError {
            message: format!(
                "{}#{}: userset must set exactly one of this, computedUserset, \
                 tupleToUserset, union, intersection or difference",
                type_name, relation
            ),
        });
    }

    let children = |docs: Vec<UsersetDocument>| {
        docs.into_iter()
            .map(|child| userset_from_document(child, type_name, relation))
            .collect::<DomainResult<Vec<_>>>()
    };

    if this.is_some() {
        return Ok(Userset::This);
    }
    if let Some(computed) = computed_userset {
        return Ok(Userset::ComputedUserset {
            relation: local_relation(computed, type_name, relation)?,
        });
    }
    if let Some(ttu) = tuple_to_userset {
        return Ok(Userset::TupleToUserset {
            tupleset: local_relation(ttu.tupleset, type_name, relation)?,
            computed_userset: local_relation(ttu.computed_userset, type_name, relation)?,
        });
    }
    if let Some(union) = union {
        return Ok(Userset::Union {
            children: children(union.child)?,
        });
    }
    if let Some(intersection) = intersection {
        return Ok(Userset::Intersection {
            children: children(intersection.child)?,
        });
    }
    match difference {
        Some(difference) => Ok(Userset::Exclusion {
            base: Box::new(userset_from_document(*difference.base, type_name, relation)?),
            subtract: Box::new(userset_from_document(
                *difference.subtract,
                type_name,
                relation,
            )?),
        }),
        None => Err(DomainError::ModelParseError {
            message: format!("{}#{}: empty userset", type_name, relation),
        }),
    }
}

fn type_definition_to_document(type_def: &TypeDefinition) -> TypeDefinitionDocument {
    let relations: BTreeMap<String, UsersetDocument> = type_def
        .relations
        .iter()
        .map(|r| (r.name.clone(), userset_to_document(&r.rewrite)))
        .collect();

    let metadata = if type_def.relations.is_empty() {
        None
    } else {
        let relations = type_def
            .relations
            .iter()
            .map(|r| {
                let types = r
                    .type_constraints
                    .iter()
                    .map(type_constraint_to_document)
                    .collect();
                (
                    r.name.clone(),
                    RelationMetadataDocument {
                        directly_related_user_types: types,
                    },
                )
            })
            .collect();
        Some(MetadataDocument {
            relations: Some(relations),
        })
    };

    TypeDefinitionDocument {
        type_name: type_def.type_name.clone(),
        relations: Some(relations),
        metadata,
    }
}

fn type_constraint_to_document(constraint: &TypeConstraint) -> RelationReferenceDocument {
    RelationReferenceDocument {
        type_name: constraint.type_name.clone(),
        relation: constraint.relation.clone(),
        wildcard: constraint
            .wildcard
            .then(|| Value::Object(serde_json::Map::new())),
    }
}

fn userset_to_document(userset: &Userset) -> UsersetDocument {
    let relation_ref = |relation: &str| ObjectRelationDocument {
        object: None,
        relation: relation.to_string(),
    };

    match userset {
        Userset::This => UsersetDocument {
            this: Some(Value::Object(serde_json::Map::new())),
            ..Default::default()
        },
        Userset::ComputedUserset { relation } => UsersetDocument {
            computed_userset: Some(relation_ref(relation)),
            ..Default::default()
        },
        Userset::TupleToUserset {
            tupleset,
            computed_userset,
        } => UsersetDocument {
            tuple_to_userset: Some(TupleToUsersetDocument {
                tupleset: relation_ref(tupleset),
                computed_userset: relation_ref(computed_userset),
            }),
            ..Default::default()
        },
        Userset::Union { children } => UsersetDocument {
            union: Some(UsersetsDocument {
                child: children.iter().map(userset_to_document).collect(),
            }),
            ..Default::default()
        },
        Userset::Intersection { children } => UsersetDocument {
            intersection: Some(UsersetsDocument {
                child: children.iter().map(userset_to_document).collect(),
            }),
            ..Default::default()
        },
        Userset::Exclusion { base, subtract } => UsersetDocument {
            difference: Some(DifferenceDocument {
                base: Box::new(userset_to_document(base)),
                subtract: Box::new(userset_to_document(subtract)),
            }),
            ..Default::default()
        },
    }
}

//! Authorization model types and JSON codec.
//!
//! This module contains:
//! - Core type definitions (User, Object, Relation, Tuple)
//! - Authorization model structures
//! - The OpenFGA-style JSON document codec
//! - `TypeSystem`, the cached lookup view used by the resolver

pub mod json;
mod type_system;
mod types;
#[cfg(test)]
mod types_proptest;

pub use json::{parse_model, to_json};
pub use type_system::TypeSystem;
pub use types::*;

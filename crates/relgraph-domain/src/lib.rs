//! relgraph-domain: Core relationship-based authorization logic
//!
//! This crate contains:
//! - Authorization model types and the JSON model format
//! - Model validation
//! - The type system used to validate tuples
//! - The relation graph resolver (Check, ListObjects, ListUsers)
//!
//! Storage is reached through the [`resolver::TupleReader`] and
//! [`resolver::ModelReader`] traits; this crate never touches a backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relgraph-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Types, JSON format, lookup   │
//! │  validation/ - Model validation             │
//! │  resolver/   - Graph resolution engine      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod model;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult, ErrorKind};

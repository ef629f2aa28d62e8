//! Graph resolver for permission checks.
//!
//! The resolver performs async graph traversal to determine
//! if a user has a specific permission on an object.
//!
//! # Module Structure
//!
//! - `config`: Resolver configuration (depth limit, timeout)
//! - `context`: Internal traversal context (depth, visited path)
//! - `cancellation`: Caller-controlled cancellation token
//! - `traits`: Storage seams (`TupleReader`, `ModelReader`)
//! - `types`: Request and response types
//! - `graph_resolver`: Check, ListObjects and ListUsers evaluation

mod cancellation;
mod config;
mod context;
mod graph_resolver;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use cancellation::CancellationToken;
pub use config::ResolverConfig;
pub use graph_resolver::GraphResolver;
pub use traits::{ModelReader, TupleReader};
pub use types::{
    CheckRequest, CheckResult, ListObjectsRequest, ListObjectsResult, ListUsersRequest,
    ListUsersResult, StoredTupleRef,
};

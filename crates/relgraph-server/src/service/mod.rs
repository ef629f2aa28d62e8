//! External operations of the embedded authorization service.
//!
//! `AuthzService` is the single entry point: store lifecycle, model
//! publishing, tuple writes and reads, and the Check / ListObjects /
//! ListUsers queries. It validates requests, enforces the configured
//! limits and maps every failure to a [`crate::error::ServiceError`].
//!
//! Tuple writes are validated against the pinned (or latest) model before
//! storage sees them, so a check never meets a tuple its model disallows.

mod authz;
mod types;

pub use authz::AuthzService;
pub use types::{
    AuthorizationModelResponse, CheckParams, CheckResponse, ListObjectsParams,
    ListObjectsResponse, ListUsersParams, ListUsersResponse, ReadRequest, StoreResponse,
    TupleKey, WriteAuthorizationModelResponse, WriteRequest,
};

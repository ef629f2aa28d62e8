//! relgraph-server: the embedded authorization service
//!
//! This crate wires the domain resolver to storage and exposes the
//! external operations:
//! - Store lifecycle and model publishing
//! - Tuple writes (validated against the model) and reads
//! - Check, ListObjects and ListUsers
//! - Configuration and logging setup
//! - The document-management walkthrough run by the `relgraph` binary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relgraph-server                 │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Configuration           │
//! │  observability.rs - Logging setup           │
//! │  error.rs         - ServiceError            │
//! │  adapters.rs      - Storage → domain traits │
//! │  service/         - AuthzService            │
//! │  scenario.rs      - Demo walkthrough        │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod observability;
pub mod scenario;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::AuthzService;

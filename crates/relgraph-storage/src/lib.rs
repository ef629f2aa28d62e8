//! relgraph-storage: Storage abstraction layer
//!
//! This crate provides:
//! - The `DataStore` trait for stores, tuples and authorization models
//! - `MemoryDataStore`, an indexed in-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relgraph-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! │  error.rs    - StorageError                 │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{
    DataStore, Store, StoredAuthorizationModel, StoredTuple, TupleFilter, TupleSnapshot,
};

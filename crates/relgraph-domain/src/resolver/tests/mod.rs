//! Tests for the graph resolver module.
//!
//! Organized by functionality:
//! - Direct tuple resolution and type constraints
//! - Computed relations (computed userset, tuple-to-userset)
//! - Union, intersection and exclusion relations
//! - Safety features (cycles, depth limiting, timeouts, cancellation)
//! - Request validation and schema errors
//! - ListObjects / ListUsers

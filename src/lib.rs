//! Per-user knowledge-graph memory.
//!
//! Each user id maps to its own graph file of entities and relations. All
//! reads and writes for one user are serialised, and every write replaces
//! the file atomically.

pub mod adapters;
pub mod config;
pub mod error;
pub mod logger;
pub mod memory;
pub mod protocol;

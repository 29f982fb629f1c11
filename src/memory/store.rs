//! Storage trait — the load/save contract the engine consumes.
//!
//! Implementations are `Send + Sync` and perform blocking I/O; the
//! [`GraphMemory`](super::GraphMemory) facade calls them from
//! `spawn_blocking` while holding the location's guard.

use crate::error::AppError;

use super::graph::Graph;
use super::keyspace::StorageLocation;

pub trait GraphStorage: Send + Sync {
    /// Short name for logs (e.g. `"jsonl"`).
    fn storage_type(&self) -> &str;

    /// Read the full graph. A location that does not exist yet is an empty
    /// graph, not an error.
    fn load(&self, location: &StorageLocation) -> Result<Graph, AppError>;

    /// Replace the stored graph. Either the whole new graph becomes visible
    /// or the previous one stays exactly as it was.
    fn save(&self, location: &StorageLocation, graph: &Graph) -> Result<(), AppError>;
}

//! `jsonl` storage — one line-record file per user.
//!
//! Saves never write the target in place: the encoded graph goes to a
//! temporary sibling (`.memory_*.tmp`), is flushed and synced, then renamed
//! over the target. The directory is synced after the rename on unix; once
//! the rename has happened the save counts as done, so a failed directory
//! sync is only logged.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::AppError;

use super::super::codec;
use super::super::graph::Graph;
use super::super::keyspace::StorageLocation;
use super::super::store::GraphStorage;

const TEMP_PREFIX: &str = ".memory_";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Default)]
pub struct JsonlFileStore;

/// A fully written, synced temporary file not yet renamed into place.
///
/// Dropping it without [`commit`](Self::commit) removes the temporary file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged contents.
    pub fn commit(self) -> Result<(), AppError> {
        let target = self.target;
        self.file.persist(&target).map_err(|e| {
            AppError::StorageUnavailable(format!("cannot replace {}: {}", target.display(), e.error))
        })?;
        if let Err(e) = sync_parent(&target) {
            warn!(path = %target.display(), "graph replaced but directory sync failed: {e}");
        }
        Ok(())
    }
}

impl JsonlFileStore {
    pub fn new() -> Self {
        Self
    }

    /// Write `graph` to a temporary file next to `location`.
    pub fn stage(&self, location: &StorageLocation, graph: &Graph) -> Result<StagedWrite, AppError> {
        let text = codec::encode_graph(graph)?;
        let dir = location.dir();

        let mut file = Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| unavailable("create temp file in", dir, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| unavailable("write", file.path(), e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| unavailable("sync", file.path(), e))?;

        Ok(StagedWrite {
            file,
            target: location.path().to_path_buf(),
        })
    }
}

impl GraphStorage for JsonlFileStore {
    fn storage_type(&self) -> &str {
        "jsonl"
    }

    fn load(&self, location: &StorageLocation) -> Result<Graph, AppError> {
        let path = location.path();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(location = %location, "no graph file yet; starting empty");
                return Ok(Graph::new());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(AppError::CorruptRecord {
                    path: path.to_path_buf(),
                    line: 0,
                    reason: format!("not valid UTF-8: {e}"),
                });
            }
            Err(e) => return Err(unavailable("read", path, e)),
        };
        codec::decode_graph(path, &text)
    }

    fn save(&self, location: &StorageLocation, graph: &Graph) -> Result<(), AppError> {
        self.stage(location, graph)?.commit()?;
        debug!(
            location = %location,
            entities = graph.entity_count(),
            relations = graph.relation_count(),
            "graph persisted"
        );
        Ok(())
    }
}

fn unavailable(action: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::StorageUnavailable(format!("cannot {action} {}: {e}", path.display()))
}

#[cfg(unix)]
fn sync_parent(target: &Path) -> std::io::Result<()> {
    match target.parent() {
        Some(dir) => fs::File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) -> std::io::Result<()> {
    Ok(())
}

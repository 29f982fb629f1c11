//! Line-record codec for graph files.
//!
//! One JSON object per line, discriminated by `"type"`:
//!
//! ```text
//! {"type":"entity","name":"Alice","entityType":"person","observations":["likes tea"]}
//! {"type":"relation","from":"Alice","to":"Bob","relationType":"knows"}
//! ```
//!
//! Blank lines are skipped. Any other line that does not decode aborts the
//! whole load with [`AppError::CorruptRecord`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::graph::Graph;
use super::types::{Entity, Relation};

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Entity(Entity),
    Relation(Relation),
}

/// Borrowing twin of [`Record`] so encoding a graph does not clone it.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RecordRef<'a> {
    Entity(&'a Entity),
    Relation(&'a Relation),
}

pub fn encode(record: &Record) -> Result<String, AppError> {
    serde_json::to_string(record).map_err(|e| AppError::Memory(format!("encode record: {e}")))
}

pub fn decode(line: &str) -> Result<Record, serde_json::Error> {
    serde_json::from_str(line)
}

/// Serialise a whole graph: entities first, then relations, each line
/// newline-terminated.
pub fn encode_graph(graph: &Graph) -> Result<String, AppError> {
    let mut out = String::new();
    let records = graph
        .entities()
        .map(RecordRef::Entity)
        .chain(graph.relations().map(RecordRef::Relation));
    for record in records {
        let line = serde_json::to_string(&record)
            .map_err(|e| AppError::Memory(format!("encode record: {e}")))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Parse a whole graph file. `path` is only used for error reporting.
pub fn decode_graph(path: &Path, text: &str) -> Result<Graph, AppError> {
    let mut entities = Vec::new();
    let mut relations = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode(line) {
            Ok(Record::Entity(e)) => entities.push(e),
            Ok(Record::Relation(r)) => relations.push(r),
            Err(e) => {
                return Err(AppError::CorruptRecord {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(Graph::from_parts(entities, relations))
}

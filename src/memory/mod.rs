//! Memory subsystem — one knowledge graph per user, one file per graph.
//!
//! The memory system owns a data root and resolves each user id to a file
//! inside it:
//!
//! ```text
//! {data_dir}/
//! ├── memory_{sha256(user_a)}.json
//! └── memory_{sha256(user_b)}.json
//! ```
//!
//! Every operation runs as guard → load → apply → save → release for the
//! user's location. The apply step is one of the pure operators on
//! [`Graph`]; reads skip the save.

pub mod codec;
pub mod graph;
pub mod guard;
pub mod keyspace;
pub mod store;
pub mod stores;
pub mod types;

pub use graph::Graph;
pub use guard::ConcurrencyGuard;
pub use keyspace::{StorageLocation, UserKeyspace};
pub use store::GraphStorage;
pub use types::{
    Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, ObservationResult, Relation,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::protocol::{Operation, Outcome};

const ENTITIES_DELETED: &str = "Entities deleted successfully";
const OBSERVATIONS_DELETED: &str = "Observations deleted successfully";
const RELATIONS_DELETED: &str = "Relations deleted successfully";

/// Configuration for the memory subsystem.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Directory holding the per-user graph files. Created if missing.
    pub data_dir: PathBuf,
}

/// Central memory system. Constructed once at startup, shared via `Arc`.
pub struct GraphMemory {
    keyspace: UserKeyspace,
    guard: ConcurrencyGuard,
    storage: Arc<dyn GraphStorage>,
}

impl GraphMemory {
    /// Open the data root with the default `jsonl` file storage.
    pub fn new(config: MemoryConfig) -> Result<Self, AppError> {
        Self::with_storage(config, Arc::new(stores::jsonl::JsonlFileStore::new()))
    }

    pub fn with_storage(
        config: MemoryConfig,
        storage: Arc<dyn GraphStorage>,
    ) -> Result<Self, AppError> {
        fs::create_dir_all(&config.data_dir).map_err(|e| {
            AppError::StorageUnavailable(format!(
                "cannot create {}: {e}",
                config.data_dir.display()
            ))
        })?;

        info!(
            data_dir = %config.data_dir.display(),
            storage = storage.storage_type(),
            "memory system initialised"
        );

        Ok(Self {
            keyspace: UserKeyspace::new(config.data_dir),
            guard: ConcurrencyGuard::new(),
            storage,
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.keyspace.root()
    }

    pub fn location_for(&self, user_id: &str) -> StorageLocation {
        self.keyspace.location_for(user_id)
    }

    // ── Operators ─────────────────────────────────────────────────────

    pub async fn create_entities(
        &self,
        user_id: &str,
        entities: Vec<Entity>,
    ) -> Result<Vec<Entity>, AppError> {
        self.mutate(user_id, "create_entities", move |g| Ok(g.create_entities(entities)))
            .await
    }

    pub async fn create_relations(
        &self,
        user_id: &str,
        relations: Vec<Relation>,
    ) -> Result<Vec<Relation>, AppError> {
        self.mutate(user_id, "create_relations", move |g| Ok(g.create_relations(relations)))
            .await
    }

    pub async fn add_observations(
        &self,
        user_id: &str,
        additions: Vec<ObservationAddition>,
    ) -> Result<Vec<ObservationResult>, AppError> {
        self.mutate(user_id, "add_observations", move |g| g.add_observations(&additions))
            .await
    }

    pub async fn delete_entities(&self, user_id: &str, names: Vec<String>) -> Result<(), AppError> {
        self.mutate(user_id, "delete_entities", move |g| {
            g.delete_entities(&names);
            Ok(())
        })
        .await
    }

    pub async fn delete_observations(
        &self,
        user_id: &str,
        deletions: Vec<ObservationDeletion>,
    ) -> Result<(), AppError> {
        self.mutate(user_id, "delete_observations", move |g| {
            g.delete_observations(&deletions);
            Ok(())
        })
        .await
    }

    pub async fn delete_relations(
        &self,
        user_id: &str,
        relations: Vec<Relation>,
    ) -> Result<(), AppError> {
        self.mutate(user_id, "delete_relations", move |g| {
            g.delete_relations(&relations);
            Ok(())
        })
        .await
    }

    pub async fn read_graph(&self, user_id: &str) -> Result<KnowledgeGraph, AppError> {
        self.query(user_id, "read_graph", |g| g.to_knowledge_graph())
            .await
    }

    pub async fn search_nodes(&self, user_id: &str, query: String) -> Result<KnowledgeGraph, AppError> {
        self.query(user_id, "search_nodes", move |g| g.search(&query))
            .await
    }

    pub async fn open_nodes(
        &self,
        user_id: &str,
        names: Vec<String>,
    ) -> Result<KnowledgeGraph, AppError> {
        self.query(user_id, "open_nodes", move |g| g.open(&names))
            .await
    }

    /// Run one protocol operation for `user_id`.
    pub async fn execute(&self, user_id: &str, op: Operation) -> Result<Outcome, AppError> {
        Ok(match op {
            Operation::CreateEntities { entities } => {
                Outcome::Entities(self.create_entities(user_id, entities).await?)
            }
            Operation::CreateRelations { relations } => {
                Outcome::Relations(self.create_relations(user_id, relations).await?)
            }
            Operation::AddObservations { observations } => {
                Outcome::Observations(self.add_observations(user_id, observations).await?)
            }
            Operation::DeleteEntities { entity_names } => {
                self.delete_entities(user_id, entity_names).await?;
                Outcome::message(ENTITIES_DELETED)
            }
            Operation::DeleteObservations { deletions } => {
                self.delete_observations(user_id, deletions).await?;
                Outcome::message(OBSERVATIONS_DELETED)
            }
            Operation::DeleteRelations { relations } => {
                self.delete_relations(user_id, relations).await?;
                Outcome::message(RELATIONS_DELETED)
            }
            Operation::ReadGraph => Outcome::Graph(self.read_graph(user_id).await?),
            Operation::SearchNodes { query } => {
                Outcome::Graph(self.search_nodes(user_id, query).await?)
            }
            Operation::OpenNodes { names } => Outcome::Graph(self.open_nodes(user_id, names).await?),
        })
    }

    // ── Cycle helpers ─────────────────────────────────────────────────

    /// guard → load → `apply` → save. Nothing is saved when `apply` fails.
    async fn mutate<R, F>(&self, user_id: &str, op: &'static str, apply: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Graph) -> Result<R, AppError> + Send + 'static,
        R: Send + 'static,
    {
        let location = self.keyspace.location_for(user_id);
        let held = self.guard.acquire(&location).await?;
        let storage = self.storage.clone();

        // The guard travels with the blocking work so it is only released
        // once the file has been written, even if this future is dropped.
        let result = tokio::task::spawn_blocking(move || -> Result<R, AppError> {
            let location = held.location();
            let mut graph = storage.load(location)?;
            let out = apply(&mut graph)?;
            storage.save(location, &graph)?;
            debug!(
                location = %location,
                op,
                entities = graph.entity_count(),
                relations = graph.relation_count(),
                "mutation applied"
            );
            Ok(out)
        })
        .await
        .map_err(|e| AppError::Memory(format!("{op} join: {e}")))?;

        if let Err(e) = &result {
            warn!(location = %location, op, error = %e, "mutation aborted");
        }
        result
    }

    /// guard → load → `read`.
    async fn query<R, F>(&self, user_id: &str, op: &'static str, read: F) -> Result<R, AppError>
    where
        F: FnOnce(&Graph) -> R + Send + 'static,
        R: Send + 'static,
    {
        let location = self.keyspace.location_for(user_id);
        let held = self.guard.acquire(&location).await?;
        let storage = self.storage.clone();

        tokio::task::spawn_blocking(move || -> Result<R, AppError> {
            let graph = storage.load(held.location())?;
            debug!(location = %held.location(), op, "query served");
            Ok(read(&graph))
        })
        .await
        .map_err(|e| AppError::Memory(format!("{op} join: {e}")))?
    }
}

impl std::fmt::Debug for GraphMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphMemory")
            .field("data_dir", &self.keyspace.root())
            .field("storage", &self.storage.storage_type())
            .field("guard", &self.guard)
            .finish()
    }
}

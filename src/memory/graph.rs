//! In-memory graph for one user and the operators that act on it.
//!
//! Every operator is a plain function of `(&mut Graph, payload)`; loading
//! and persisting happen around it in [`GraphMemory`](super::GraphMemory).
//! Entities are keyed by name and relations by their identity triple, both
//! in ordered collections, so uniqueness holds structurally and iteration
//! (and therefore the on-disk record order) is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::AppError;

use super::types::{
    Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, ObservationResult, Relation,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    entities: BTreeMap<String, Entity>,
    relations: BTreeSet<Relation>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from raw records. Later duplicates of a name or triple
    /// are dropped, and each entity's observations are deduplicated.
    pub fn from_parts(
        entities: impl IntoIterator<Item = Entity>,
        relations: impl IntoIterator<Item = Relation>,
    ) -> Self {
        let mut graph = Self::new();
        graph.create_entities(entities);
        graph.create_relations(relations);
        graph
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter()
    }

    pub fn to_knowledge_graph(&self) -> KnowledgeGraph {
        KnowledgeGraph {
            entities: self.entities.values().cloned().collect(),
            relations: self.relations.iter().cloned().collect(),
        }
    }

    // ── Mutations ─────────────────────────────────────────────────────

    /// Add entities whose name is not taken yet. Returns those added.
    pub fn create_entities(&mut self, entities: impl IntoIterator<Item = Entity>) -> Vec<Entity> {
        let mut added = Vec::new();
        for mut entity in entities {
            if self.entities.contains_key(&entity.name) {
                continue;
            }
            dedup_in_place(&mut entity.observations);
            added.push(entity.clone());
            self.entities.insert(entity.name.clone(), entity);
        }
        added
    }

    /// Add relations whose triple is not present yet. Returns those added.
    ///
    /// Endpoints are not required to exist.
    pub fn create_relations(
        &mut self,
        relations: impl IntoIterator<Item = Relation>,
    ) -> Vec<Relation> {
        relations
            .into_iter()
            .filter(|r| self.relations.insert(r.clone()))
            .collect()
    }

    /// Append new observations to existing entities.
    ///
    /// Every target entity is checked before anything is touched, so a
    /// missing one leaves the graph unchanged.
    pub fn add_observations(
        &mut self,
        additions: &[ObservationAddition],
    ) -> Result<Vec<ObservationResult>, AppError> {
        if let Some(missing) = additions
            .iter()
            .find(|a| !self.entities.contains_key(&a.entity_name))
        {
            return Err(AppError::EntityNotFound(missing.entity_name.clone()));
        }

        let mut results = Vec::with_capacity(additions.len());
        for addition in additions {
            let Some(entity) = self.entities.get_mut(&addition.entity_name) else {
                return Err(AppError::EntityNotFound(addition.entity_name.clone()));
            };
            let mut added = Vec::new();
            for content in &addition.contents {
                if !entity.observations.contains(content) {
                    entity.observations.push(content.clone());
                    added.push(content.clone());
                }
            }
            results.push(ObservationResult {
                entity_name: addition.entity_name.clone(),
                added_observations: added,
            });
        }
        Ok(results)
    }

    /// Remove entities by name and every relation touching them.
    /// Unknown names are ignored.
    pub fn delete_entities(&mut self, names: &[String]) {
        let doomed: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.entities.retain(|name, _| !doomed.contains(name.as_str()));
        self.relations
            .retain(|r| !doomed.contains(r.from.as_str()) && !doomed.contains(r.to.as_str()));
    }

    /// Remove listed observation strings. Unknown entities are skipped.
    pub fn delete_observations(&mut self, deletions: &[ObservationDeletion]) {
        for deletion in deletions {
            if let Some(entity) = self.entities.get_mut(&deletion.entity_name) {
                entity
                    .observations
                    .retain(|o| !deletion.observations.contains(o));
            }
        }
    }

    /// Remove relations matching an input triple exactly.
    pub fn delete_relations(&mut self, relations: &[Relation]) {
        for relation in relations {
            self.relations.remove(relation);
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Case-insensitive substring search over name, type and observations.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> KnowledgeGraph {
        let needle = query.to_lowercase();
        self.subgraph(|e| e.matches_lowercase(&needle))
    }

    /// Entities named in `names`, plus relations between them.
    pub fn open(&self, names: &[String]) -> KnowledgeGraph {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.subgraph(|e| wanted.contains(e.name.as_str()))
    }

    fn subgraph(&self, keep: impl Fn(&Entity) -> bool) -> KnowledgeGraph {
        let entities: Vec<Entity> = self.entities.values().filter(|e| keep(*e)).cloned().collect();
        let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let relations = self
            .relations
            .iter()
            .filter(|r| names.contains(r.from.as_str()) && names.contains(r.to.as_str()))
            .cloned()
            .collect();
        KnowledgeGraph { entities, relations }
    }
}

/// Drop repeated strings, keeping the first occurrence of each.
fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(item.clone()));
}

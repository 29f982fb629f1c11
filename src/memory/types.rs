//! Graph vocabulary shared by the codec, the store and the protocol.
//!
//! Field names on the wire follow the camelCase shape clients already send
//! (`entityType`, `relationType`, `entityName`, ...).

use serde::{Deserialize, Serialize};

/// A named, typed node with free-text observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: observations.into_iter().map(Into::into).collect(),
        }
    }

    /// True when `needle` (already lowercased) occurs in the name, the type
    /// or any observation, ignoring case.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.entity_type.to_lowercase().contains(needle)
            || self
                .observations
                .iter()
                .any(|o| o.to_lowercase().contains(needle))
    }
}

/// A directed, typed edge between two entity names.
///
/// Ordering follows `(from, to, relation_type)`, the identity triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }

    /// True when either endpoint is `name`.
    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }
}

/// Flat, serialisable view of a graph (or of a filtered part of one).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }
}

/// One item of an AddObservations batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationAddition {
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// Per-entity outcome of an AddObservations batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationResult {
    pub entity_name: String,
    pub added_observations: Vec<String>,
}

/// One item of a DeleteObservations batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_uses_camel_case_fields() {
        let e = Entity::new("Alice", "person", ["likes tea"]);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["entityType"], "person");
        assert_eq!(v["observations"][0], "likes tea");
        assert!(v.get("entity_type").is_none());
    }

    #[test]
    fn relation_uses_from_to_relation_type() {
        let r: Relation =
            serde_json::from_str(r#"{"from":"A","to":"B","relationType":"knows"}"#).unwrap();
        assert_eq!(r, Relation::new("A", "B", "knows"));
    }

    #[test]
    fn entity_matches_ignore_case() {
        let e = Entity::new("Alice", "Person", ["Works at ACME"]);
        assert!(e.matches_lowercase("ali"));
        assert!(e.matches_lowercase("person"));
        assert!(e.matches_lowercase("acme"));
        assert!(e.matches_lowercase(""));
        assert!(!e.matches_lowercase("bob"));
    }

    #[test]
    fn observation_result_field_names() {
        let r = ObservationResult {
            entity_name: "A".into(),
            added_observations: vec!["z".into()],
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["entityName"], "A");
        assert_eq!(v["addedObservations"][0], "z");
    }
}

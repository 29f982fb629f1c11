//! Request/response envelope for the nine graph operations.
//!
//! ```json
//! {"id": 1, "user_id": "alice", "op": "create_entities", "entities": [...]}
//! {"id": 1, "ok": true, "result": [...]}
//! {"id": 2, "ok": false, "error": {"kind": "entity_not_found", "message": "...", "retryable": false}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::memory::{
    Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, ObservationResult, Relation,
};

/// One graph operation with its payload, tagged by `"op"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateEntities {
        entities: Vec<Entity>,
    },
    CreateRelations {
        relations: Vec<Relation>,
    },
    AddObservations {
        observations: Vec<ObservationAddition>,
    },
    DeleteEntities {
        #[serde(rename = "entityNames")]
        entity_names: Vec<String>,
    },
    DeleteObservations {
        deletions: Vec<ObservationDeletion>,
    },
    DeleteRelations {
        relations: Vec<Relation>,
    },
    ReadGraph,
    SearchNodes {
        query: String,
    },
    OpenNodes {
        names: Vec<String>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateEntities { .. } => "create_entities",
            Operation::CreateRelations { .. } => "create_relations",
            Operation::AddObservations { .. } => "add_observations",
            Operation::DeleteEntities { .. } => "delete_entities",
            Operation::DeleteObservations { .. } => "delete_observations",
            Operation::DeleteRelations { .. } => "delete_relations",
            Operation::ReadGraph => "read_graph",
            Operation::SearchNodes { .. } => "search_nodes",
            Operation::OpenNodes { .. } => "open_nodes",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Echoed back verbatim so callers can match out-of-order responses.
    #[serde(default)]
    pub id: Option<Value>,
    pub user_id: String,
    #[serde(flatten)]
    pub op: Operation,
}

impl Request {
    /// Decode one request line. On failure the error response still carries
    /// the `id` if the line was at least a JSON object with one.
    pub fn parse(line: &str) -> Result<Self, Response> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| Response::bad_request(None, format!("invalid JSON: {e}")))?;
        let id = value.get("id").cloned();
        serde_json::from_value(value)
            .map_err(|e| Response::bad_request(id, format!("invalid request: {e}")))
    }
}

/// Successful operation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Entities(Vec<Entity>),
    Relations(Vec<Relation>),
    Observations(Vec<ObservationResult>),
    Message { message: String },
    Graph(KnowledgeGraph),
}

impl Outcome {
    pub fn message(message: impl Into<String>) -> Self {
        Outcome::Message {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn from_result(id: Option<Value>, result: Result<Outcome, AppError>) -> Self {
        match result {
            Ok(outcome) => Self {
                id,
                ok: true,
                result: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                id,
                ok: false,
                result: None,
                error: Some(ErrorBody {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                }),
            },
        }
    }

    pub fn bad_request(id: Option<Value>, message: String) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorBody {
                kind: "bad_request".to_string(),
                message,
                retryable: false,
            }),
        }
    }

    /// Single-line JSON encoding.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"error":{{"kind":"internal","message":"encode response: {e}","retryable":false}}}}"#)
        })
    }
}

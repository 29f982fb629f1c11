//! Integration tests for per-user graph memory.
//!
//! ```bash
//! cargo test --test test_graph_memory
//! ```

use std::fs;
use std::sync::Arc;

use kgraph_memory::error::AppError;
use kgraph_memory::memory::codec;
use kgraph_memory::memory::stores::jsonl::JsonlFileStore;
use kgraph_memory::memory::{
    Entity, GraphMemory, GraphStorage, MemoryConfig, ObservationAddition, ObservationDeletion,
    Relation,
};
use tempfile::TempDir;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn make_memory() -> (TempDir, GraphMemory) {
    let temp = TempDir::new().expect("tempdir");
    let memory = GraphMemory::new(MemoryConfig {
        data_dir: temp.path().to_path_buf(),
    })
    .expect("open memory");
    (temp, memory)
}

fn person(name: &str) -> Entity {
    Entity::new(name, "person", Vec::<String>::new())
}

fn add(entity: &str, contents: &[&str]) -> ObservationAddition {
    ObservationAddition {
        entity_name: entity.to_string(),
        contents: contents.iter().map(|c| c.to_string()).collect(),
    }
}

// ── Idempotence and dedup ─────────────────────────────────────────────────────

#[tokio::test]
async fn create_entities_twice_is_idempotent() {
    let (_temp, mem) = make_memory();
    let batch = vec![person("Alice"), person("Bob")];

    let first = mem.create_entities("u1", batch.clone()).await.expect("first");
    let second = mem.create_entities("u1", batch).await.expect("second");

    assert_eq!(first.len(), 2);
    assert!(second.is_empty());
    assert_eq!(mem.read_graph("u1").await.expect("read").entities.len(), 2);
}

#[tokio::test]
async fn duplicate_relation_stored_once() {
    let (_temp, mem) = make_memory();
    let knows = Relation::new("A", "B", "knows");

    mem.create_relations("u1", vec![knows.clone()]).await.expect("first");
    let again = mem.create_relations("u1", vec![knows.clone()]).await.expect("second");

    assert!(again.is_empty());
    assert_eq!(mem.read_graph("u1").await.expect("read").relations, vec![knows]);
}

#[tokio::test]
async fn observations_dedup_across_calls() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![person("A")]).await.expect("create");

    mem.add_observations("u1", vec![add("A", &["x", "y"])]).await.expect("first");
    let second = mem
        .add_observations("u1", vec![add("A", &["y", "z"])])
        .await
        .expect("second");

    assert_eq!(second[0].entity_name, "A");
    assert_eq!(second[0].added_observations, vec!["z"]);
    let kg = mem.read_graph("u1").await.expect("read");
    assert_eq!(kg.entities[0].observations, vec!["x", "y", "z"]);
}

// ── Deletes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_entity_cascades_to_relations() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![person("A"), person("B")]).await.expect("create");
    mem.create_relations("u1", vec![Relation::new("A", "B", "knows")])
        .await
        .expect("relate");

    mem.delete_entities("u1", vec!["A".into()]).await.expect("delete");

    let kg = mem.read_graph("u1").await.expect("read");
    assert_eq!(kg.entity_names(), vec!["B"]);
    assert!(kg.relations.is_empty());
}

#[tokio::test]
async fn deletes_tolerate_missing_targets() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![Entity::new("A", "t", ["keep", "drop"])])
        .await
        .expect("create");

    mem.delete_entities("u1", vec!["ghost".into()]).await.expect("entities");
    mem.delete_relations("u1", vec![Relation::new("A", "ghost", "r")])
        .await
        .expect("relations");
    mem.delete_observations(
        "u1",
        vec![
            ObservationDeletion {
                entity_name: "ghost".into(),
                observations: vec!["x".into()],
            },
            ObservationDeletion {
                entity_name: "A".into(),
                observations: vec!["drop".into()],
            },
        ],
    )
    .await
    .expect("observations");

    let kg = mem.read_graph("u1").await.expect("read");
    assert_eq!(kg.entities[0].observations, vec!["keep"]);
}

// ── Queries ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_is_case_insensitive_and_filters_relations() {
    let (_temp, mem) = make_memory();
    mem.create_entities(
        "u1",
        vec![
            person("Alice"),
            Entity::new("Bob", "person", ["friend of ALICE"]),
            Entity::new("Rex", "dog", Vec::<String>::new()),
        ],
    )
    .await
    .expect("create");
    mem.create_relations(
        "u1",
        vec![
            Relation::new("Alice", "Bob", "knows"),
            Relation::new("Alice", "Rex", "owns"),
        ],
    )
    .await
    .expect("relate");

    let found = mem.search_nodes("u1", "ali".into()).await.expect("search");
    assert_eq!(found.entity_names(), vec!["Alice", "Bob"]);
    assert_eq!(found.relations, vec![Relation::new("Alice", "Bob", "knows")]);

    let everything = mem.search_nodes("u1", String::new()).await.expect("search all");
    assert_eq!(everything.entities.len(), 3);
    assert_eq!(everything.relations.len(), 2);
}

#[tokio::test]
async fn open_nodes_returns_named_subgraph() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![person("A"), person("B"), person("C")])
        .await
        .expect("create");
    mem.create_relations(
        "u1",
        vec![Relation::new("A", "B", "knows"), Relation::new("B", "C", "knows")],
    )
    .await
    .expect("relate");

    let opened = mem
        .open_nodes("u1", vec!["A".into(), "B".into(), "Z".into()])
        .await
        .expect("open");
    assert_eq!(opened.entity_names(), vec!["A", "B"]);
    assert_eq!(opened.relations, vec![Relation::new("A", "B", "knows")]);
}

#[tokio::test]
async fn empty_payloads_succeed() {
    let (_temp, mem) = make_memory();
    assert!(mem.create_entities("u1", vec![]).await.expect("entities").is_empty());
    assert!(mem.create_relations("u1", vec![]).await.expect("relations").is_empty());
    assert!(mem.add_observations("u1", vec![]).await.expect("obs").is_empty());
    assert!(mem.open_nodes("u1", vec![]).await.expect("open").is_empty());
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_observations_to_missing_entity_aborts_batch() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![person("A")]).await.expect("create");
    let before = fs::read_to_string(mem.location_for("u1").path()).expect("file");

    let err = mem
        .add_observations("u1", vec![add("A", &["x"]), add("Missing", &["y"])])
        .await
        .expect_err("must fail");

    assert!(matches!(err, AppError::EntityNotFound(ref n) if n == "Missing"));
    assert!(!err.is_retryable());
    let after = fs::read_to_string(mem.location_for("u1").path()).expect("file");
    assert_eq!(before, after, "nothing from the failed batch may be persisted");
}

#[tokio::test]
async fn corrupt_file_aborts_and_is_left_alone() {
    let (_temp, mem) = make_memory();
    let path = mem.location_for("u1").path().to_path_buf();
    let text = "{\"type\":\"entity\",\"name\":\"A\",\"entityType\":\"t\",\"observations\":[]}\n{oops\n";
    fs::write(&path, text).expect("seed");

    let err = mem
        .create_entities("u1", vec![person("B")])
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::CorruptRecord { line: 2, .. }), "got {err}");
    assert_eq!(fs::read_to_string(&path).expect("file"), text);

    assert!(mem.read_graph("u1").await.is_err());
}

// ── Isolation and durability ──────────────────────────────────────────────────

#[tokio::test]
async fn users_are_isolated() {
    let (temp, mem) = make_memory();
    mem.create_entities("alice", vec![person("A")]).await.expect("alice");
    mem.create_entities("bob", vec![person("B")]).await.expect("bob");

    assert_eq!(mem.read_graph("alice").await.expect("a").entity_names(), vec!["A"]);
    assert_eq!(mem.read_graph("bob").await.expect("b").entity_names(), vec!["B"]);

    let files = fs::read_dir(temp.path()).expect("list").count();
    assert_eq!(files, 2);
}

#[tokio::test]
async fn graph_survives_reopen() {
    let temp = TempDir::new().expect("tempdir");
    let config = MemoryConfig {
        data_dir: temp.path().to_path_buf(),
    };
    {
        let mem = GraphMemory::new(config.clone()).expect("open");
        mem.create_entities("u1", vec![Entity::new("A", "t", ["x"])]).await.expect("create");
        mem.create_relations("u1", vec![Relation::new("A", "B", "r")]).await.expect("relate");
    }
    let mem = GraphMemory::new(config).expect("reopen");
    let kg = mem.read_graph("u1").await.expect("read");
    assert_eq!(kg.entities, vec![Entity::new("A", "t", ["x"])]);
    assert_eq!(kg.relations, vec![Relation::new("A", "B", "r")]);
}

#[tokio::test]
async fn interrupted_persist_keeps_previous_graph() {
    let (_temp, mem) = make_memory();
    mem.create_entities("u1", vec![person("A")]).await.expect("create");
    let location = mem.location_for("u1");
    let store = JsonlFileStore::new();

    let before = store.load(&location).expect("load");
    let mut next = before.clone();
    next.create_entities([person("B")]);

    // Written and synced, but the process "dies" before the rename.
    let staged = store.stage(&location, &next).expect("stage");
    assert!(staged.temp_path().exists());

    let kg = mem.read_graph("u1").await.expect("read");
    assert_eq!(kg.entity_names(), vec!["A"]);
    assert_eq!(store.load(&location).expect("reload"), before);
}

#[test]
fn stored_file_round_trips_through_codec() {
    let temp = TempDir::new().expect("tempdir");
    let mem = GraphMemory::new(MemoryConfig {
        data_dir: temp.path().to_path_buf(),
    })
    .expect("open");
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        mem.create_entities("u1", vec![Entity::new("A", "t", ["x", "y"]), person("B")])
            .await
            .expect("create");
        mem.create_relations("u1", vec![Relation::new("A", "B", "knows")])
            .await
            .expect("relate");
    });

    let path = mem.location_for("u1").path().to_path_buf();
    let text = fs::read_to_string(&path).expect("file");
    let graph = codec::decode_graph(&path, &text).expect("decode");
    assert_eq!(codec::encode_graph(&graph).expect("encode"), text);
}

// ── Concurrency ───────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_lose_nothing() {
    let (_temp, mem) = make_memory();
    let mem = Arc::new(mem);
    const N: usize = 48;

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let mem = mem.clone();
            tokio::spawn(async move {
                mem.create_entities("shared", vec![person(&format!("entity-{i:02}"))])
                    .await
            })
        })
        .collect();
    for task in tasks {
        let added = task.await.expect("join").expect("create");
        assert_eq!(added.len(), 1);
    }

    let kg = mem.read_graph("shared").await.expect("read");
    assert_eq!(kg.entities.len(), N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_observation_adds_compose() {
    let (_temp, mem) = make_memory();
    let mem = Arc::new(mem);
    mem.create_entities("shared", vec![person("A")]).await.expect("create");
    const N: usize = 32;

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let mem = mem.clone();
            tokio::spawn(async move {
                let fact = format!("fact {i}");
                mem.add_observations("shared", vec![add("A", &[fact.as_str()])])
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("join").expect("add");
    }

    let kg = mem.read_graph("shared").await.expect("read");
    assert_eq!(kg.entities[0].observations.len(), N);
}

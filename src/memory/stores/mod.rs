//! Storage implementations.

pub mod jsonl;

//! Transports that feed requests into [`GraphMemory`](crate::memory::GraphMemory).

pub mod stdio;

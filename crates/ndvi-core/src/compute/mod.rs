//! Deferred chunk-local execution.

pub mod graph;

pub use self::graph::{NodeId, TaskGraph};

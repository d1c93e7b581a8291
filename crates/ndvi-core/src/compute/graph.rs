use std::fmt;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{NdviError, Result};
use crate::pipeline::ProgressReporter;

/// Handle to a node in a [`TaskGraph`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type TaskFn<T> = Box<dyn FnOnce(&[&T]) -> Result<T> + Send>;

enum Payload<T> {
    Value(T),
    Task { inputs: Vec<NodeId>, op: TaskFn<T> },
}

struct Node<T> {
    label: String,
    level: usize,
    payload: Payload<T>,
}

/// A deferred computation graph over chunk-local buffers.
///
/// Nodes are added in dependency order, so a task's inputs always exist when
/// it is registered and the graph is acyclic by construction. Execution runs
/// one dependency level at a time on the rayon pool and drops every buffer
/// as soon as its last consumer has finished.
pub struct TaskGraph<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for TaskGraph<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T: Send + Sync> TaskGraph<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes that do work when executed.
    pub fn task_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.payload, Payload::Task { .. }))
            .count()
    }

    /// Register an already-computed buffer.
    pub fn source(&mut self, label: impl Into<String>, value: T) -> NodeId {
        self.push(label.into(), 0, Payload::Value(value))
    }

    /// Register a task consuming the outputs of `inputs`, in that order.
    pub fn task<F>(&mut self, label: impl Into<String>, inputs: &[NodeId], op: F) -> Result<NodeId>
    where
        F: FnOnce(&[&T]) -> Result<T> + Send + 'static,
    {
        let label = label.into();
        let mut level = 0;
        for id in inputs {
            let node = self
                .nodes
                .get(id.0)
                .ok_or_else(|| NdviError::Graph(format!("task '{label}' depends on unknown node {id}")))?;
            level = level.max(node.level + 1);
        }
        Ok(self.push(
            label,
            level.max(1),
            Payload::Task {
                inputs: inputs.to_vec(),
                op: Box::new(op),
            },
        ))
    }

    fn push(&mut self, label: String, level: usize, payload: Payload<T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            label,
            level,
            payload,
        });
        id
    }

    /// Run every node `outputs` depend on and return the outputs in order.
    ///
    /// Nodes no output depends on are never run. The first failing task
    /// aborts execution with its error.
    pub fn execute(self, outputs: &[NodeId], reporter: &dyn ProgressReporter) -> Result<Vec<T>> {
        let n = self.nodes.len();
        for id in outputs {
            if id.0 >= n {
                return Err(NdviError::Graph(format!("unknown output node {id}")));
            }
        }

        let mut needed = vec![false; n];
        for id in outputs {
            needed[id.0] = true;
        }
        for i in (0..n).rev() {
            if needed[i] {
                if let Payload::Task { inputs, .. } = &self.nodes[i].payload {
                    for input in inputs {
                        needed[input.0] = true;
                    }
                }
            }
        }

        // Outputs hold one extra reference so they survive to the end.
        let mut consumers = vec![0usize; n];
        for id in outputs {
            consumers[id.0] += 1;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let (true, Payload::Task { inputs, .. }) = (needed[i], &node.payload) {
                for input in inputs {
                    consumers[input.0] += 1;
                }
            }
        }

        let max_level = self.nodes.iter().map(|n| n.level).max().unwrap_or(0);
        let mut arena: Vec<Option<T>> = Vec::with_capacity(n);
        let mut levels: Vec<Vec<(usize, String, Vec<NodeId>, TaskFn<T>)>> =
            (0..=max_level).map(|_| Vec::new()).collect();
        for (i, node) in self.nodes.into_iter().enumerate() {
            match node.payload {
                Payload::Value(v) if needed[i] => arena.push(Some(v)),
                Payload::Value(_) => arena.push(None),
                Payload::Task { inputs, op } => {
                    arena.push(None);
                    if needed[i] {
                        levels[node.level].push((i, node.label, inputs, op));
                    }
                }
            }
        }

        let total: usize = levels.iter().map(Vec::len).sum();
        debug!(nodes = n, tasks = total, levels = max_level, "Executing task graph");
        let mut done = 0usize;

        for batch in levels.into_iter().filter(|b| !b.is_empty()) {
            let consumed: Vec<NodeId> = batch.iter().flat_map(|(_, _, inputs, _)| inputs.clone()).collect();
            let results: Vec<(usize, T)> = {
                let arena = &arena;
                batch
                    .into_par_iter()
                    .map(|(i, label, inputs, op)| {
                        let args = inputs
                            .iter()
                            .map(|id| {
                                arena[id.0].as_ref().ok_or_else(|| {
                                    NdviError::Graph(format!("input {id} of '{label}' was released early"))
                                })
                            })
                            .collect::<Result<Vec<&T>>>()?;
                        op(&args).map(|v| (i, v)).inspect_err(|e| {
                            warn!(node = %label, error = %e, "Task failed");
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            };

            done += results.len();
            for (i, value) in results {
                arena[i] = Some(value);
            }
            for id in consumed {
                consumers[id.0] -= 1;
                if consumers[id.0] == 0 {
                    arena[id.0] = None;
                }
            }
            reporter.advance(done);
        }

        outputs
            .iter()
            .map(|id| {
                arena[id.0]
                    .take()
                    .ok_or_else(|| NdviError::Graph(format!("output node {id} listed twice")))
            })
            .collect()
    }
}

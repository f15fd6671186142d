//! Schedulers materialize a task graph.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{self, Either};
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::error::{MetagraphError, Result};
use crate::value::Value;

use super::graph::{TaskGraph, TaskKey, TaskNode};

/// Executes the part of a graph a target task depends on.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn execute(&self, graph: &TaskGraph, target: &TaskKey) -> Result<Value>;
}

/// Runs tasks one by one, in topological order, on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

#[async_trait]
impl Scheduler for SequentialScheduler {
    async fn execute(&self, graph: &TaskGraph, target: &TaskKey) -> Result<Value> {
        let lineage = graph.lineage(target)?;
        let mut results: HashMap<TaskKey, Value> = HashMap::with_capacity(lineage.len());
        for node in lineage {
            let value = node.run(&results).inspect_err(|err| {
                tracing::warn!(task = %node.key(), error = %err, "task failed");
            })?;
            tracing::debug!(task = %node.key(), op = node.op().kind(), "task materialized");
            results.insert(node.key().clone(), value);
        }
        results.remove(target).ok_or_else(|| MetagraphError::Execution {
            task: target.to_string(),
            message: "target produced no value".to_string(),
        })
    }
}

/// Task state during a parallel run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting for dependencies
    Pending,
    /// Dependencies done, not yet started
    Ready,
    Running,
    Completed,
    Failed,
}

/// Runs ready tasks in batches on the blocking thread pool.
///
/// Inside a tokio runtime each task goes to `spawn_blocking`. Polled outside
/// one, tasks run inline on the caller, batch by batch.
#[derive(Debug, Clone, Copy)]
pub struct ParallelScheduler {
    max_parallel: usize,
}

impl Default for ParallelScheduler {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

impl ParallelScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max parallel tasks (at least one)
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }
}

struct RunState {
    nodes: Vec<Arc<TaskNode>>,
    states: Vec<NodeState>,
    position: HashMap<TaskKey, usize>,
    results: HashMap<TaskKey, Value>,
}

impl RunState {
    fn new(nodes: Vec<Arc<TaskNode>>) -> Self {
        let position = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.key().clone(), idx))
            .collect();
        let states = vec![NodeState::Pending; nodes.len()];
        Self {
            nodes,
            states,
            position,
            results: HashMap::new(),
        }
    }

    fn dependencies_satisfied(&self, idx: usize) -> bool {
        self.nodes[idx].dependencies().all(|dep| {
            self.position
                .get(dep)
                .map(|&pos| self.states[pos] == NodeState::Completed)
                .unwrap_or(false)
        })
    }

    fn update_ready_nodes(&mut self) -> Vec<usize> {
        let ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| {
                matches!(self.states[idx], NodeState::Pending | NodeState::Ready)
                    && self.dependencies_satisfied(idx)
            })
            .collect();
        for &idx in &ready {
            self.states[idx] = NodeState::Ready;
        }
        ready
    }

    fn is_completed(&self) -> bool {
        self.states.iter().all(|s| *s == NodeState::Completed)
    }
}

#[async_trait]
impl Scheduler for ParallelScheduler {
    async fn execute(&self, graph: &TaskGraph, target: &TaskKey) -> Result<Value> {
        let mut run = RunState::new(graph.lineage(target)?);

        while !run.is_completed() {
            let ready = run.update_ready_nodes();
            if ready.is_empty() {
                return Err(MetagraphError::Execution {
                    task: target.to_string(),
                    message: "no runnable tasks left".to_string(),
                });
            }

            let mut in_flight = FuturesUnordered::new();
            for idx in ready.into_iter().take(self.max_parallel) {
                run.states[idx] = NodeState::Running;
                let node = Arc::clone(&run.nodes[idx]);
                let inputs: HashMap<TaskKey, Value> = node
                    .dependencies()
                    .filter_map(|dep| run.results.get(dep).map(|v| (dep.clone(), v.clone())))
                    .collect();
                let job = match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        let task = node.key().to_string();
                        let joined = handle.spawn_blocking(move || node.run(&inputs));
                        Either::Left(async move {
                            joined.await.unwrap_or_else(|err| {
                                Err(MetagraphError::Execution {
                                    task,
                                    message: err.to_string(),
                                })
                            })
                        })
                    }
                    Err(_) => Either::Right(future::ready(node.run(&inputs))),
                };
                in_flight.push(async move { (idx, job.await) });
            }

            let mut failure: Option<MetagraphError> = None;
            while let Some((idx, outcome)) = in_flight.next().await {
                let key = run.nodes[idx].key().clone();
                match outcome {
                    Ok(value) => {
                        tracing::debug!(task = %key, "task materialized");
                        run.states[idx] = NodeState::Completed;
                        run.results.insert(key, value);
                    }
                    Err(err) => {
                        tracing::warn!(task = %key, error = %err, "task failed");
                        run.states[idx] = NodeState::Failed;
                        failure.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }

        run.results.remove(target).ok_or_else(|| MetagraphError::Execution {
            task: target.to_string(),
            message: "target produced no value".to_string(),
        })
    }
}

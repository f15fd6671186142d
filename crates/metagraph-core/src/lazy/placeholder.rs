//! Placeholders stand in for values that have not been computed yet.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::resolver::ArgProbe;
use crate::types::ConcreteTypeId;
use crate::value::Value;

use super::graph::{TaskGraph, TaskInput, TaskKey, TaskNode};
use super::scheduler::Scheduler;

/// Handle to the deferred output of one task.
#[derive(Clone)]
pub struct Placeholder {
    concrete_type: Option<ConcreteTypeId>,
    key: TaskKey,
    graph: Arc<TaskGraph>,
    scheduler: Arc<dyn Scheduler>,
}

impl Placeholder {
    pub(crate) fn new(
        concrete_type: Option<ConcreteTypeId>,
        key: TaskKey,
        graph: TaskGraph,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            concrete_type,
            key,
            graph: Arc::new(graph),
            scheduler,
        }
    }

    /// Placeholder over a value that is already known.
    pub(crate) fn from_value(
        concrete_type: Option<ConcreteTypeId>,
        value: Value,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let key = TaskKey::derive("computed", &[TaskInput::Literal(value.clone())]);
        let mut graph = TaskGraph::new();
        graph.push(TaskNode::computed(key.clone(), value));
        Self::new(concrete_type, key, graph, scheduler)
    }

    /// Concrete type of the eventual value; `None` for plain values.
    pub fn concrete_type(&self) -> Option<&ConcreteTypeId> {
        self.concrete_type.as_ref()
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Number of tasks recorded behind this placeholder
    pub fn task_count(&self) -> usize {
        self.graph.len()
    }

    /// Run the graph up to this placeholder's task.
    pub async fn compute(&self) -> Result<Value> {
        tracing::info!(
            task = %self.key,
            tasks = self.graph.len(),
            "materializing placeholder"
        );
        self.scheduler.execute(&self.graph, &self.key).await
    }

    /// Compute once and keep the result as a single finished task.
    pub async fn persist(&self) -> Result<Placeholder> {
        let value = self.compute().await?;
        let mut graph = TaskGraph::new();
        graph.push(TaskNode::computed(self.key.clone(), value));
        Ok(Self {
            concrete_type: self.concrete_type.clone(),
            key: self.key.clone(),
            graph: Arc::new(graph),
            scheduler: Arc::clone(&self.scheduler),
        })
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("concrete_type", &self.concrete_type)
            .field("key", &self.key)
            .field("tasks", &self.graph.len())
            .finish()
    }
}

/// Argument of a lazy call: ready now, or deferred.
#[derive(Debug, Clone)]
pub enum LazyValue {
    Ready(Value),
    Deferred(Placeholder),
}

impl LazyValue {
    pub fn placeholder(&self) -> Option<&Placeholder> {
        match self {
            Self::Deferred(placeholder) => Some(placeholder),
            Self::Ready(_) => None,
        }
    }

    pub fn into_placeholder(self) -> Option<Placeholder> {
        match self {
            Self::Deferred(placeholder) => Some(placeholder),
            Self::Ready(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Materialize the value, running the graph for deferred values.
    pub async fn compute(&self) -> Result<Value> {
        match self {
            Self::Ready(value) => Ok(value.clone()),
            Self::Deferred(placeholder) => placeholder.compute().await,
        }
    }

    pub(crate) fn probe(&self) -> ArgProbe<'_> {
        match self {
            Self::Ready(value) => ArgProbe::Ready(value),
            Self::Deferred(placeholder) => ArgProbe::Deferred(placeholder.concrete_type()),
        }
    }

    /// Fold this argument into `graph` and return the input that refers to it.
    pub(crate) fn absorb_into(&self, graph: &mut TaskGraph) -> TaskInput {
        match self {
            Self::Ready(value) => TaskInput::Literal(value.clone()),
            Self::Deferred(placeholder) => {
                graph.merge(placeholder.graph());
                TaskInput::Task(placeholder.key().clone())
            }
        }
    }
}

impl From<Value> for LazyValue {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

impl From<Placeholder> for LazyValue {
    fn from(placeholder: Placeholder) -> Self {
        Self::Deferred(placeholder)
    }
}

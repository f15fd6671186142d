//! Deferred task graph
//!
//! Nodes are stored in insertion order. A node is always inserted after the
//! nodes it reads from, so insertion order is a topological order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::algorithm::ConcreteAlgorithm;
use crate::error::{KernelError, MetagraphError, Result};
use crate::translator::Translator;
use crate::types::{ConcreteTypeId, ConstructorFn};
use crate::value::Value;

/// Content-derived task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(pub String);

impl TaskKey {
    /// Derive a key from an operation label and the identities of its inputs.
    pub fn derive(label: &str, inputs: &[TaskInput]) -> Self {
        let mut material = label.as_bytes().to_vec();
        for input in inputs {
            material.push(0);
            match input {
                TaskInput::Task(key) => material.extend_from_slice(key.as_str().as_bytes()),
                TaskInput::Literal(value) => material.extend_from_slice(value.token().as_bytes()),
            }
        }
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, &material);
        Self(format!("{}-{}", label, id.simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// One input of a task.
#[derive(Debug, Clone)]
pub enum TaskInput {
    /// Output of another task in the same graph
    Task(TaskKey),
    /// Ready value embedded in the node
    Literal(Value),
}

/// Work a task performs.
#[derive(Clone)]
pub enum TaskOp {
    /// Build a wrapper value from the inputs
    Construct {
        concrete_type: ConcreteTypeId,
        constructor: ConstructorFn,
    },
    Translate(Arc<Translator>),
    Algorithm(Arc<ConcreteAlgorithm>),
    /// Already materialized result
    Computed(Value),
}

impl TaskOp {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construct { .. } => "construct",
            Self::Translate(_) => "translate",
            Self::Algorithm(_) => "algorithm",
            Self::Computed(_) => "computed",
        }
    }

    fn run(&self, inputs: Vec<Value>) -> Result<Value, KernelError> {
        match self {
            Self::Construct { constructor, .. } => constructor(inputs),
            Self::Translate(translator) => {
                let value = inputs
                    .into_iter()
                    .next()
                    .ok_or(KernelError::MissingArgument(0))?;
                translator.call(value)
            }
            Self::Algorithm(algorithm) => algorithm.call(inputs),
            Self::Computed(value) => Ok(value.clone()),
        }
    }
}

impl fmt::Debug for TaskOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct { concrete_type, .. } => write!(f, "Construct<{}>", concrete_type),
            Self::Translate(translator) => write!(f, "Translate<{}>", translator.name()),
            Self::Algorithm(algorithm) => {
                write!(f, "Algorithm<{}.{}>", algorithm.plugin(), algorithm.name())
            }
            Self::Computed(value) => write!(f, "Computed<{:?}>", value),
        }
    }
}

/// A node of the deferred graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    key: TaskKey,
    op: TaskOp,
    inputs: Vec<TaskInput>,
}

impl TaskNode {
    pub fn construct(
        concrete_type: ConcreteTypeId,
        constructor: ConstructorFn,
        inputs: Vec<TaskInput>,
    ) -> Self {
        let key = TaskKey::derive(&format!("construct.{}", concrete_type), &inputs);
        Self {
            key,
            op: TaskOp::Construct {
                concrete_type,
                constructor,
            },
            inputs,
        }
    }

    /// Keyed by translator name and endpoints; names alone are not unique.
    pub fn translate(translator: Arc<Translator>, input: TaskInput) -> Self {
        let inputs = vec![input];
        let label = format!(
            "{}:{}->{}",
            translator.name(),
            translator.src(),
            translator.dst()
        );
        let key = TaskKey::derive(&label, &inputs);
        Self {
            key,
            op: TaskOp::Translate(translator),
            inputs,
        }
    }

    /// Keyed by plugin, implementation name and the abstract path it implements.
    pub fn algorithm(algorithm: Arc<ConcreteAlgorithm>, inputs: Vec<TaskInput>) -> Self {
        let label = format!(
            "{}.{}:{}",
            algorithm.plugin(),
            algorithm.name(),
            algorithm.abstract_path()
        );
        let key = TaskKey::derive(&label, &inputs);
        Self {
            key,
            op: TaskOp::Algorithm(algorithm),
            inputs,
        }
    }

    /// Node that yields `value` without running anything.
    pub fn computed(key: TaskKey, value: Value) -> Self {
        Self {
            key,
            op: TaskOp::Computed(value),
            inputs: Vec::new(),
        }
    }

    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn op(&self) -> &TaskOp {
        &self.op
    }

    pub fn inputs(&self) -> &[TaskInput] {
        &self.inputs
    }

    /// Keys of the tasks this node reads from
    pub fn dependencies(&self) -> impl Iterator<Item = &TaskKey> {
        self.inputs.iter().filter_map(|input| match input {
            TaskInput::Task(key) => Some(key),
            TaskInput::Literal(_) => None,
        })
    }

    /// Run the node given the outputs of its dependencies.
    pub fn run(&self, results: &HashMap<TaskKey, Value>) -> Result<Value> {
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            inputs.push(match input {
                TaskInput::Literal(value) => value.clone(),
                TaskInput::Task(key) => {
                    results
                        .get(key)
                        .cloned()
                        .ok_or_else(|| MetagraphError::Execution {
                            task: self.key.to_string(),
                            message: format!("input {} was not materialized", key),
                        })?
                }
            });
        }
        self.op.run(inputs).map_err(|err| MetagraphError::Execution {
            task: self.key.to_string(),
            message: err.to_string(),
        })
    }
}

/// Append-only graph of deferred tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: Vec<Arc<TaskNode>>,
    index: HashMap<TaskKey, usize>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one with the same key exists.
    pub fn push(&mut self, node: TaskNode) -> TaskKey {
        let key = node.key.clone();
        if !self.index.contains_key(&key) {
            self.index.insert(key.clone(), self.nodes.len());
            self.nodes.push(Arc::new(node));
        }
        key
    }

    /// Copy in every node of `other` not already present.
    pub fn merge(&mut self, other: &TaskGraph) {
        for node in &other.nodes {
            if !self.index.contains_key(&node.key) {
                self.index.insert(node.key.clone(), self.nodes.len());
                self.nodes.push(Arc::clone(node));
            }
        }
    }

    pub fn get(&self, key: &TaskKey) -> Option<&Arc<TaskNode>> {
        self.index.get(key).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in topological order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskNode>> {
        self.nodes.iter()
    }

    /// `target` and everything it transitively reads from, in topological order.
    pub fn lineage(&self, target: &TaskKey) -> Result<Vec<Arc<TaskNode>>> {
        let Some(&target_idx) = self.index.get(target) else {
            return Err(MetagraphError::Execution {
                task: target.to_string(),
                message: "task is not part of the graph".to_string(),
            });
        };

        let mut needed: HashSet<usize> = HashSet::from([target_idx]);
        let mut stack = vec![target_idx];
        while let Some(idx) = stack.pop() {
            for dep in self.nodes[idx].dependencies() {
                let Some(&dep_idx) = self.index.get(dep) else {
                    return Err(MetagraphError::Execution {
                        task: self.nodes[idx].key.to_string(),
                        message: format!("dependency {} is not part of the graph", dep),
                    });
                };
                if needed.insert(dep_idx) {
                    stack.push(dep_idx);
                }
            }
        }

        Ok(self
            .nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| needed.contains(idx))
            .map(|(_, node)| Arc::clone(node))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_one() -> Arc<Translator> {
        Arc::new(Translator::new("add_one", "IntType", "IntType", |v| {
            Ok(Value::new(v.cast::<i64>()? + 1))
        }))
    }

    #[test]
    fn test_keys_are_content_derived() {
        let literal = Value::new(1i64);
        let a = TaskNode::translate(add_one(), TaskInput::Literal(literal.clone()));
        let b = TaskNode::translate(add_one(), TaskInput::Literal(literal));
        let c = TaskNode::translate(add_one(), TaskInput::Literal(Value::new(1i64)));
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert!(a.key().as_str().starts_with("add_one:IntType->IntType-"));
    }

    #[test]
    fn test_same_named_translators_get_distinct_keys() {
        let to_float = Arc::new(Translator::new("add_one", "IntType", "FloatType", |v| {
            Ok(Value::new(*v.cast::<i64>()? as f64 + 1.0))
        }));
        let literal = TaskInput::Literal(Value::new(1i64));
        let mut graph = TaskGraph::new();
        let int_key = graph.push(TaskNode::translate(add_one(), literal.clone()));
        let float_key = graph.push(TaskNode::translate(to_float, literal));
        assert_ne!(int_key, float_key);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_merge_deduplicates_shared_nodes() {
        let literal = Value::new(1i64);
        let mut left = TaskGraph::new();
        let first = left.push(TaskNode::translate(
            add_one(),
            TaskInput::Literal(literal.clone()),
        ));
        let mut right = TaskGraph::new();
        right.push(TaskNode::translate(add_one(), TaskInput::Literal(literal)));
        right.push(TaskNode::translate(add_one(), TaskInput::Task(first.clone())));

        left.merge(&right);
        assert_eq!(left.len(), 2);
        assert!(left.contains(&first));
    }

    #[test]
    fn test_lineage_skips_unrelated_nodes() {
        let mut graph = TaskGraph::new();
        let root = graph.push(TaskNode::translate(
            add_one(),
            TaskInput::Literal(Value::new(1i64)),
        ));
        graph.push(TaskNode::translate(
            add_one(),
            TaskInput::Literal(Value::new(5i64)),
        ));
        let leaf = graph.push(TaskNode::translate(add_one(), TaskInput::Task(root.clone())));

        let lineage = graph.lineage(&leaf).expect("lineage");
        let keys: Vec<_> = lineage.iter().map(|n| n.key().clone()).collect();
        assert_eq!(keys, vec![root, leaf]);
    }

    #[test]
    fn test_run_reports_failing_task() {
        let node = TaskNode::translate(add_one(), TaskInput::Literal(Value::new("one")));
        let err = node.run(&HashMap::new()).expect_err("bad input");
        match err {
            MetagraphError::Execution { task, .. } => assert_eq!(&task, node.key().as_str()),
            other => panic!("unexpected error: {other}"),
        }
    }
}

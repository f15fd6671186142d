//! Abstract types, abstract algorithm signatures and the callable value
//! types algorithms take as plain parameters.

use std::sync::Arc;

use metagraph_core::{AbstractAlgorithm, AbstractType, Param, Value};

/// Combines two edge weights, e.g. addition.
pub type BinaryOp = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// Decides whether an edge with the given weight is kept.
pub type EdgePredicate = Arc<dyn Fn(f64) -> bool + Send + Sync>;

/// Wrap a closure as a `BinaryOp` argument.
pub fn binary_op(op: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Value {
    Value::new::<BinaryOp>(Arc::new(op))
}

/// Wrap a closure as an `EdgePredicate` argument.
pub fn edge_predicate(predicate: impl Fn(f64) -> bool + Send + Sync + 'static) -> Value {
    Value::new::<EdgePredicate>(Arc::new(predicate))
}

pub fn abstract_types() -> Vec<AbstractType> {
    vec![
        AbstractType::new("NodeMap"),
        AbstractType::new("Graph").with_properties(["is_directed", "edge_type"]),
        AbstractType::new("Vector"),
    ]
}

pub fn abstract_algorithms() -> Vec<AbstractAlgorithm> {
    vec![
        AbstractAlgorithm::new("util.nodemap.reduce")
            .with_param(Param::typed("x", "NodeMap"))
            .with_param(Param::value_of::<BinaryOp>("func"))
            .returning_value(),
        AbstractAlgorithm::new("util.graph.aggregate_edges")
            .with_param(Param::typed("graph", "Graph"))
            .with_param(Param::value_of::<BinaryOp>("func"))
            .with_param(Param::value_of::<f64>("initial_value").with_default(Value::new(0.0f64)))
            .with_param(Param::value_of::<bool>("in_edges").with_default(Value::new(false)))
            .with_param(Param::value_of::<bool>("out_edges").with_default(Value::new(true)))
            .returning("NodeMap"),
        AbstractAlgorithm::new("util.graph.filter_edges")
            .with_param(Param::typed("graph", "Graph"))
            .with_param(Param::value_of::<EdgePredicate>("func"))
            .returning("Graph"),
        AbstractAlgorithm::new("centrality.pagerank")
            .with_param(Param::typed("graph", "Graph"))
            .with_param(Param::value_of::<f64>("damping").with_default(Value::new(0.85f64)))
            .with_param(Param::value_of::<usize>("maxiter").with_default(Value::new(50usize)))
            .with_param(Param::value_of::<f64>("tolerance").with_default(Value::new(1e-05f64)))
            .returning("NodeMap"),
    ]
}

/// Float comparison used by node map equality.
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-8 * a.abs().max(b.abs()).max(1.0)
}

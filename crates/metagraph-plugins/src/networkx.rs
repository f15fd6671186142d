//! Adjacency graphs and the algorithms that run on them.

use std::collections::{BTreeMap, BTreeSet};

use metagraph_core::{ConcreteAlgorithm, ConcreteType, KernelError, Value, WrapperError};

use crate::catalog::{approx_eq, BinaryOp};
use crate::python::PythonNodeMap;

/// Edge attributes by name.
pub type EdgeAttributes = BTreeMap<String, f64>;

/// Node set plus attributed edges.
///
/// Undirected edges are stored once, keyed `(min, max)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdjacencyGraph {
    directed: bool,
    nodes: BTreeSet<u64>,
    edges: BTreeMap<(u64, u64), EdgeAttributes>,
}

impl AdjacencyGraph {
    pub fn undirected() -> Self {
        Self::default()
    }

    pub fn directed() -> Self {
        Self {
            directed: true,
            ..Self::default()
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn add_node(&mut self, node: u64) {
        self.nodes.insert(node);
    }

    /// Add an edge, replacing the attributes of an existing one.
    pub fn add_edge(&mut self, u: u64, v: u64, attributes: EdgeAttributes) {
        self.nodes.insert(u);
        self.nodes.insert(v);
        let key = self.edge_key(u, v);
        self.edges.insert(key, attributes);
    }

    pub fn add_weighted_edge(&mut self, u: u64, v: u64, weight: f64) {
        self.add_edge(u, v, EdgeAttributes::from([("weight".to_string(), weight)]));
    }

    pub fn with_weighted_edges(
        mut self,
        edges: impl IntoIterator<Item = (u64, u64, f64)>,
    ) -> Self {
        for (u, v, w) in edges {
            self.add_weighted_edge(u, v, w);
        }
        self
    }

    pub fn nodes(&self) -> impl Iterator<Item = u64> + '_ {
        self.nodes.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edges as `(u, v, attributes)`; undirected edges appear once.
    pub fn edges(&self) -> impl Iterator<Item = (u64, u64, &EdgeAttributes)> + '_ {
        self.edges.iter().map(|(&(u, v), attrs)| (u, v, attrs))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_attribute(&self, u: u64, v: u64, name: &str) -> Option<f64> {
        self.edges
            .get(&self.edge_key(u, v))
            .and_then(|attrs| attrs.get(name))
            .copied()
    }

    fn edge_key(&self, u: u64, v: u64) -> (u64, u64) {
        if self.directed {
            (u, v)
        } else {
            (u.min(v), u.max(v))
        }
    }
}

/// Adjacency graph whose edges all carry `edge_weight_label`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkXGraph {
    graph: AdjacencyGraph,
    edge_weight_label: String,
}

impl NetworkXGraph {
    pub fn new(graph: AdjacencyGraph) -> Result<Self, WrapperError> {
        Self::with_weight_label(graph, "weight")
    }

    pub fn with_weight_label(
        graph: AdjacencyGraph,
        label: impl Into<String>,
    ) -> Result<Self, WrapperError> {
        let label = label.into();
        if graph.edges().any(|(_, _, attrs)| !attrs.contains_key(&label)) {
            return Err(WrapperError::new(format!(
                "Graph is missing specified weight label: {}",
                label
            )));
        }
        Ok(Self {
            graph,
            edge_weight_label: label,
        })
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn edge_weight_label(&self) -> &str {
        &self.edge_weight_label
    }

    /// `(u, v, weight)` for every edge
    pub fn weighted_edges(&self) -> impl Iterator<Item = (u64, u64, f64)> + '_ {
        self.graph.edges().filter_map(|(u, v, attrs)| {
            attrs.get(&self.edge_weight_label).map(|w| (u, v, *w))
        })
    }
}

fn graphs_equal(a: &NetworkXGraph, b: &NetworkXGraph) -> bool {
    a.graph.directed == b.graph.directed
        && a.graph.nodes == b.graph.nodes
        && a.graph.edge_count() == b.graph.edge_count()
        && a.weighted_edges()
            .zip(b.weighted_edges())
            .all(|((au, av, aw), (bu, bv, bw))| au == bu && av == bv && approx_eq(aw, bw))
}

pub fn graph_type() -> ConcreteType {
    ConcreteType::wrapper::<NetworkXGraph>("NetworkXGraph", "Graph")
        .with_property("is_directed", |value| {
            Ok(serde_json::Value::Bool(
                value.cast::<NetworkXGraph>()?.graph.is_directed(),
            ))
        })
        .with_property("edge_type", |_| Ok(serde_json::Value::from("map")))
        .with_equality(|a, b| {
            match (a.downcast_ref::<NetworkXGraph>(), b.downcast_ref::<NetworkXGraph>()) {
                (Some(a), Some(b)) => graphs_equal(a, b),
                _ => false,
            }
        })
        .with_constructor(|args| {
            let graph = args
                .first()
                .ok_or(KernelError::MissingArgument(0))?
                .cast::<AdjacencyGraph>()?
                .clone();
            let wrapped = match args.get(1) {
                Some(label) => NetworkXGraph::with_weight_label(graph, label.cast::<String>()?)?,
                None => NetworkXGraph::new(graph)?,
            };
            Ok(Value::new(wrapped))
        })
}

/// Fold edge weights onto nodes.
///
/// Undirected edges count for both endpoints. Directed edges count for the
/// source when `out_edges` is set and for the target when `in_edges` is set.
pub fn aggregate_edges() -> ConcreteAlgorithm {
    ConcreteAlgorithm::new("nx_aggregate_edges", "util.graph.aggregate_edges", |args| {
        let graph = arg(&args, 0)?.cast::<NetworkXGraph>()?;
        let func = arg(&args, 1)?.cast::<BinaryOp>()?;
        let initial = *arg(&args, 2)?.cast::<f64>()?;
        let in_edges = *arg(&args, 3)?.cast::<bool>()?;
        let out_edges = *arg(&args, 4)?.cast::<bool>()?;

        let mut result: PythonNodeMap = graph.graph.nodes().map(|n| (n, initial)).collect();
        let mut fold = |node: u64, weight: f64| {
            if let Some(acc) = result.get_mut(&node) {
                *acc = func(*acc, weight);
            }
        };
        let directed = graph.graph.is_directed();
        for (u, v, w) in graph.weighted_edges() {
            if !directed || out_edges {
                fold(u, w);
            }
            if !directed || in_edges {
                fold(v, w);
            }
        }
        Ok(Value::new(result))
    })
    .accepting("NetworkXGraph")
    .accepting_value()
    .accepting_value()
    .accepting_value()
    .accepting_value()
    .returning("PythonNodeMapType")
}

/// Unweighted PageRank by power iteration.
pub fn pagerank() -> ConcreteAlgorithm {
    ConcreteAlgorithm::new("nx_pagerank", "centrality.pagerank", |args| {
        let graph = arg(&args, 0)?.cast::<NetworkXGraph>()?;
        let damping = *arg(&args, 1)?.cast::<f64>()?;
        let max_iterations = *arg(&args, 2)?.cast::<usize>()?;
        let tolerance = *arg(&args, 3)?.cast::<f64>()?;
        if !(0.0..=1.0).contains(&damping) {
            return Err(KernelError::failed(format!(
                "damping must be within [0, 1], received {}",
                damping
            )));
        }
        Ok(Value::new(power_iteration(
            graph.graph(),
            damping,
            max_iterations,
            tolerance,
        )))
    })
    .accepting("NetworkXGraph")
    .accepting_value()
    .accepting_value()
    .accepting_value()
    .returning("PythonNodeMapType")
}

fn power_iteration(
    graph: &AdjacencyGraph,
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
) -> PythonNodeMap {
    let nodes: Vec<u64> = graph.nodes().collect();
    let n = nodes.len();
    if n == 0 {
        return PythonNodeMap::new();
    }
    let position: BTreeMap<u64, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let mut out_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (u, v, _) in graph.edges() {
        let (i, j) = (position[&u], position[&v]);
        out_edges[i].push(j);
        if !graph.is_directed() && i != j {
            out_edges[j].push(i);
        }
    }
    let dangling: Vec<usize> = (0..n).filter(|&i| out_edges[i].is_empty()).collect();

    let teleport = (1.0 - damping) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];
    for _ in 0..max_iterations {
        let dangling_sum: f64 = dangling.iter().map(|&i| scores[i]).sum();
        let base = teleport + damping * dangling_sum / n as f64;
        next.iter_mut().for_each(|s| *s = base);

        for (i, targets) in out_edges.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = damping * scores[i] / targets.len() as f64;
            for &j in targets {
                next[j] += share;
            }
        }

        let error: f64 = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut scores, &mut next);
        if error < n as f64 * tolerance {
            break;
        }
    }

    nodes.into_iter().zip(scores).collect()
}

fn arg(args: &[Value], position: usize) -> Result<&Value, KernelError> {
    args.get(position)
        .ok_or(KernelError::MissingArgument(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::binary_op;

    fn weighted_graph() -> AdjacencyGraph {
        AdjacencyGraph::undirected().with_weighted_edges([
            (0, 1, 1.0),
            (0, 2, 2.0),
            (0, 3, 3.0),
            (0, 4, 4.0),
            (2, 4, 5.0),
            (3, 4, 6.0),
        ])
    }

    #[test]
    fn test_wrapper_requires_weight_label() {
        let err = NetworkXGraph::with_weight_label(weighted_graph(), "capacity")
            .expect_err("missing label");
        assert_eq!(
            err.to_string(),
            "Graph is missing specified weight label: capacity"
        );
        assert!(NetworkXGraph::new(weighted_graph()).is_ok());
    }

    #[test]
    fn test_aggregate_edges_sums_undirected_weights() {
        let graph = NetworkXGraph::new(weighted_graph()).expect("graph");
        let out = aggregate_edges()
            .call(vec![
                Value::new(graph),
                binary_op(|a, b| a + b),
                Value::new(0.0f64),
                Value::new(false),
                Value::new(true),
            ])
            .expect("aggregate");
        let expected: PythonNodeMap =
            BTreeMap::from([(0, 10.0), (1, 1.0), (2, 7.0), (3, 9.0), (4, 15.0)]);
        assert_eq!(out.cast::<PythonNodeMap>().expect("map"), &expected);
    }

    #[test]
    fn test_aggregate_directed_respects_direction_flags() {
        let graph = NetworkXGraph::new(
            AdjacencyGraph::directed().with_weighted_edges([(0, 1, 2.0), (1, 2, 3.0)]),
        )
        .expect("graph");
        let out = aggregate_edges()
            .call(vec![
                Value::new(graph),
                binary_op(|a, b| a + b),
                Value::new(0.0f64),
                Value::new(true),
                Value::new(false),
            ])
            .expect("aggregate");
        let expected: PythonNodeMap = BTreeMap::from([(0, 0.0), (1, 2.0), (2, 3.0)]);
        assert_eq!(out.cast::<PythonNodeMap>().expect("map"), &expected);
    }

    #[test]
    fn test_pagerank_on_cycle_is_uniform() {
        let graph = AdjacencyGraph::undirected().with_weighted_edges([
            (0, 1, 12.0),
            (1, 2, 5.0),
            (2, 0, 8.0),
        ]);
        let scores = power_iteration(&graph, 0.85, 50, 1e-5);
        assert_eq!(scores.len(), 3);
        for score in scores.values() {
            assert!((score - 1.0 / 3.0).abs() < 1e-9, "{score}");
        }
    }

    #[test]
    fn test_pagerank_rewards_incoming_links() {
        let graph = AdjacencyGraph::directed().with_weighted_edges([
            (0, 2, 1.0),
            (1, 2, 1.0),
        ]);
        let scores = power_iteration(&graph, 0.85, 100, 1e-9);
        assert!(scores[&2] > scores[&0]);
        assert!((scores.values().sum::<f64>() - 1.0).abs() < 1e-6);
    }
}

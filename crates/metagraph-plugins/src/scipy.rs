//! Compressed sparse row graphs.

use std::collections::BTreeMap;

use metagraph_core::{
    ConcreteAlgorithm, ConcreteType, KernelError, Translator, Value, WrapperError,
};

use crate::catalog::{approx_eq, EdgePredicate};
use crate::networkx::{AdjacencyGraph, NetworkXGraph};

/// Square or rectangular CSR matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build from `(row, col, value)` triplets; later duplicates win.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self, WrapperError> {
        let mut cells: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (row, col, value) in triplets {
            if row >= nrows || col >= ncols {
                return Err(WrapperError::new(format!(
                    "entry ({}, {}) outside a {}x{} matrix",
                    row, col, nrows, ncols
                )));
            }
            cells.insert((row, col), value);
        }

        let mut indptr = vec![0; nrows + 1];
        let mut indices = Vec::with_capacity(cells.len());
        let mut data = Vec::with_capacity(cells.len());
        for (&(row, col), &value) in &cells {
            indptr[row + 1] += 1;
            indices.push(col);
            data.push(value);
        }
        for row in 0..nrows {
            indptr[row + 1] += indptr[row];
        }
        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored entries in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |row| {
            (self.indptr[row]..self.indptr[row + 1])
                .map(move |pos| (row, self.indices[pos], self.data[pos]))
        })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows {
            return None;
        }
        let span = self.indptr[row]..self.indptr[row + 1];
        self.indices[span.clone()]
            .binary_search(&col)
            .ok()
            .map(|offset| self.data[span.start + offset])
    }

    pub fn is_symmetric(&self) -> bool {
        self.nrows == self.ncols
            && self
                .iter()
                .all(|(row, col, value)| self.get(col, row) == Some(value))
    }

    /// Copy keeping only entries for which `keep` holds.
    pub fn filter(&self, mut keep: impl FnMut(f64) -> bool) -> Self {
        let mut indptr = vec![0; self.nrows + 1];
        let mut indices = Vec::new();
        let mut data = Vec::new();
        for (row, col, value) in self.iter() {
            if keep(value) {
                indptr[row + 1] += 1;
                indices.push(col);
                data.push(value);
            }
        }
        for row in 0..self.nrows {
            indptr[row + 1] += indptr[row];
        }
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        }
    }
}

/// Square adjacency matrix plus the node id of each row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScipyGraph {
    matrix: CsrMatrix,
    node_list: Vec<u64>,
}

impl ScipyGraph {
    pub fn new(matrix: CsrMatrix, node_list: Vec<u64>) -> Result<Self, WrapperError> {
        let (nrows, ncols) = matrix.shape();
        if nrows != ncols {
            return Err(WrapperError::new(format!(
                "adjacency matrix must be square, received {}x{}",
                nrows, ncols
            )));
        }
        if node_list.len() != nrows {
            return Err(WrapperError::new(format!(
                "{} node ids given for {} rows",
                node_list.len(),
                nrows
            )));
        }
        Ok(Self { matrix, node_list })
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn node_list(&self) -> &[u64] {
        &self.node_list
    }

    /// A non-symmetric adjacency matrix means a directed graph.
    pub fn is_directed(&self) -> bool {
        !self.matrix.is_symmetric()
    }
}

fn graphs_equal(a: &ScipyGraph, b: &ScipyGraph) -> bool {
    a.node_list == b.node_list
        && a.matrix.shape() == b.matrix.shape()
        && a.matrix.nnz() == b.matrix.nnz()
        && a.matrix
            .iter()
            .zip(b.matrix.iter())
            .all(|((ar, ac, av), (br, bc, bv))| ar == br && ac == bc && approx_eq(av, bv))
}

pub fn graph_type() -> ConcreteType {
    ConcreteType::wrapper::<ScipyGraph>("ScipyGraph", "Graph")
        .with_property("is_directed", |value| {
            Ok(serde_json::Value::Bool(value.cast::<ScipyGraph>()?.is_directed()))
        })
        .with_property("edge_type", |_| Ok(serde_json::Value::from("map")))
        .with_equality(|a, b| {
            match (a.downcast_ref::<ScipyGraph>(), b.downcast_ref::<ScipyGraph>()) {
                (Some(a), Some(b)) => graphs_equal(a, b),
                _ => false,
            }
        })
}

/// Rows follow sorted node ids; undirected edges fill both triangles.
pub fn networkx_to_scipy() -> Translator {
    Translator::new("networkx_to_scipy", "NetworkXGraph", "ScipyGraph", |value| {
        let nx = value.cast::<NetworkXGraph>()?;
        let node_list: Vec<u64> = nx.graph().nodes().collect();
        let position: BTreeMap<u64, usize> =
            node_list.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let directed = nx.graph().is_directed();

        let mut triplets = Vec::with_capacity(nx.graph().edge_count() * 2);
        for (u, v, w) in nx.weighted_edges() {
            let (i, j) = (position[&u], position[&v]);
            triplets.push((i, j, w));
            if !directed {
                triplets.push((j, i, w));
            }
        }
        let matrix = CsrMatrix::from_triplets(node_list.len(), node_list.len(), triplets)?;
        Ok(Value::new(ScipyGraph::new(matrix, node_list)?))
    })
}

/// Directedness comes from matrix symmetry; weights land under `weight`.
pub fn scipy_to_networkx() -> Translator {
    Translator::new("scipy_to_networkx", "ScipyGraph", "NetworkXGraph", |value| {
        let sg = value.cast::<ScipyGraph>()?;
        let directed = sg.is_directed();
        let mut graph = if directed {
            AdjacencyGraph::directed()
        } else {
            AdjacencyGraph::undirected()
        };
        for &node in sg.node_list() {
            graph.add_node(node);
        }
        for (row, col, weight) in sg.matrix().iter() {
            if !directed && row > col {
                continue;
            }
            graph.add_weighted_edge(sg.node_list()[row], sg.node_list()[col], weight);
        }
        Ok(Value::new(NetworkXGraph::new(graph)?))
    })
}

/// Keep edges whose weight satisfies `func`; every node is kept.
pub fn filter_edges() -> ConcreteAlgorithm {
    ConcreteAlgorithm::new("ss_filter_edges", "util.graph.filter_edges", |args| {
        let graph = args
            .first()
            .ok_or(KernelError::MissingArgument(0))?
            .cast::<ScipyGraph>()?;
        let keep = args
            .get(1)
            .ok_or(KernelError::MissingArgument(1))?
            .cast::<EdgePredicate>()?;
        let filtered = ScipyGraph {
            matrix: graph.matrix.filter(|w| keep(w)),
            node_list: graph.node_list.clone(),
        };
        tracing::debug!(
            before = graph.matrix.nnz(),
            after = filtered.matrix.nnz(),
            "edges filtered"
        );
        Ok(Value::new(filtered))
    })
    .accepting("ScipyGraph")
    .accepting_value()
    .returning("ScipyGraph")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::edge_predicate;

    fn triangle() -> NetworkXGraph {
        let edges = [(0, 1, 1.0), (1, 2, 3.0), (0, 2, 5.0)];
        NetworkXGraph::new(AdjacencyGraph::undirected().with_weighted_edges(edges))
            .expect("graph")
    }

    #[test]
    fn test_csr_lookup_and_symmetry() {
        let m = CsrMatrix::from_triplets(2, 2, [(0, 1, 2.0), (1, 0, 2.0)]).expect("matrix");
        assert_eq!(m.get(0, 1), Some(2.0));
        assert_eq!(m.get(0, 0), None);
        assert!(m.is_symmetric());

        let directed = CsrMatrix::from_triplets(2, 2, [(0, 1, 2.0)]).expect("matrix");
        assert!(!directed.is_symmetric());
        assert!(CsrMatrix::from_triplets(2, 2, [(2, 0, 1.0)]).is_err());
    }

    #[test]
    fn test_round_trip_through_scipy_keeps_graph() {
        let original = triangle();
        let scipy = networkx_to_scipy()
            .call(Value::new(original.clone()))
            .expect("to scipy");
        let sg = scipy.cast::<ScipyGraph>().expect("scipy graph");
        assert!(!sg.is_directed());
        assert_eq!(sg.matrix().nnz(), 6);

        let back = scipy_to_networkx().call(scipy).expect("to networkx");
        assert_eq!(back.cast::<NetworkXGraph>().expect("nx"), &original);
    }

    #[test]
    fn test_filter_edges_keeps_isolated_nodes() {
        let scipy = networkx_to_scipy()
            .call(Value::new(triangle()))
            .expect("to scipy");
        let out = filter_edges()
            .call(vec![scipy, edge_predicate(|w| w > 2.0)])
            .expect("filter");
        let sg = out.cast::<ScipyGraph>().expect("scipy graph");
        assert_eq!(sg.node_list(), &[0, 1, 2]);
        assert_eq!(sg.matrix().nnz(), 4);
        assert_eq!(sg.matrix().get(0, 1), None);
    }
}

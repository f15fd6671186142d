//! # Metagraph Plugins
//!
//! Default representations of node maps and graphs, the translators between
//! them and a handful of algorithms over them.
//!
//! | plugin | contributes |
//! |---|---|
//! | `core` | abstract types `NodeMap`, `Graph`, `Vector` and every abstract algorithm |
//! | `core_python` | `PythonNodeMapType`, `util.nodemap.reduce` |
//! | `core_numpy` | `NumpyNodeMap`, `NumpyVectorType`, python -> numpy |
//! | `core_graphblas` | `GrblasNodeMap`, numpy -> grblas, grblas -> python |
//! | `core_networkx` | `NetworkXGraph`, `util.graph.aggregate_edges`, `centrality.pagerank` |
//! | `core_scipy` | `ScipyGraph`, networkx <-> scipy, `util.graph.filter_edges` |
//!
//! Every type, translator and algorithm is also available on its own so
//! callers can assemble smaller bundles, e.g. to force multi-step paths.

pub mod catalog;
pub mod graphblas;
pub mod networkx;
pub mod numpy;
pub mod python;
pub mod scipy;

use metagraph_core::Plugin;

pub use catalog::{binary_op, edge_predicate, BinaryOp, EdgePredicate};
pub use graphblas::GrblasNodeMap;
pub use networkx::{AdjacencyGraph, NetworkXGraph};
pub use numpy::NumpyNodeMap;
pub use python::PythonNodeMap;
pub use scipy::{CsrMatrix, ScipyGraph};

/// Names accepted by [`plugin_by_name`], in registration order.
pub const DEFAULT_PLUGINS: [&str; 5] = [
    "core_python",
    "core_numpy",
    "core_graphblas",
    "core_networkx",
    "core_scipy",
];

/// Abstract types and abstract algorithms; register before anything else.
pub fn core() -> Plugin {
    let plugin = catalog::abstract_types()
        .into_iter()
        .fold(Plugin::new("core"), Plugin::with_abstract_type);
    catalog::abstract_algorithms()
        .into_iter()
        .fold(plugin, Plugin::with_abstract_algorithm)
}

pub fn core_python() -> Plugin {
    Plugin::new("core_python")
        .with_concrete_type(python::node_map_type())
        .with_concrete_algorithm(python::reduce())
}

pub fn core_numpy() -> Plugin {
    Plugin::new("core_numpy")
        .with_concrete_type(numpy::vector_type())
        .with_wrapper(numpy::node_map_type())
        .with_translator(numpy::python_to_numpy())
}

pub fn core_graphblas() -> Plugin {
    Plugin::new("core_graphblas")
        .with_wrapper(graphblas::node_map_type())
        .with_translator(graphblas::numpy_to_grblas())
        .with_translator(graphblas::grblas_to_python())
}

pub fn core_networkx() -> Plugin {
    Plugin::new("core_networkx")
        .with_wrapper(networkx::graph_type())
        .with_concrete_algorithm(networkx::aggregate_edges())
        .with_concrete_algorithm(networkx::pagerank())
}

pub fn core_scipy() -> Plugin {
    Plugin::new("core_scipy")
        .with_wrapper(scipy::graph_type())
        .with_translator(scipy::networkx_to_scipy())
        .with_translator(scipy::scipy_to_networkx())
        .with_concrete_algorithm(scipy::filter_edges())
}

/// Look up one of the [`DEFAULT_PLUGINS`] (or `core`) by name.
pub fn plugin_by_name(name: &str) -> Option<Plugin> {
    match name {
        "core" => Some(core()),
        "core_python" => Some(core_python()),
        "core_numpy" => Some(core_numpy()),
        "core_graphblas" => Some(core_graphblas()),
        "core_networkx" => Some(core_networkx()),
        "core_scipy" => Some(core_scipy()),
        _ => None,
    }
}

/// `core` followed by every default plugin.
pub fn default_plugins() -> Vec<Plugin> {
    std::iter::once(core())
        .chain(DEFAULT_PLUGINS.iter().filter_map(|name| plugin_by_name(name)))
        .collect()
}

//! # Metagraph Core
//!
//! Planning core for representation-agnostic algorithm dispatch.
//!
//! This crate contains:
//! - Value model and the type registry (abstract / concrete types)
//! - Translator graph and fewest-hop path planning
//! - Algorithm catalog and the dispatcher
//! - The eager [`Resolver`] and the lazy [`LazyResolver`] with its task graphs
//!
//! This crate does NOT care about:
//! - How plugins are discovered or loaded
//! - What translator and algorithm bodies actually do
//! - How a task graph is visualized
//!
//! ```text
//! resolver.call("util.graph.filter_edges", args)
//!    ↓
//! classify arguments (TypeRegistry)
//!    ↓
//! select implementation (Dispatcher)
//!    ↓
//! plan translations (TranslatorGraph)
//!    ↓
//! execute now (Resolver) / record tasks (LazyResolver)
//! ```

pub mod algorithm;
pub mod dispatcher;
pub mod error;
pub mod lazy;
pub mod plugin;
pub mod resolver;
pub mod translator;
pub mod types;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::algorithm::{
        AbstractAlgorithm, Accepts, AlgorithmCatalog, ConcreteAlgorithm, Output, Param, ParamKind,
        Returns,
    };
    pub use crate::dispatcher::{ArgSignature, Dispatch, DispatchPlan, Dispatcher};
    pub use crate::error::{KernelError, MetagraphError, Result, WrapperError};
    pub use crate::lazy::{
        DelayedWrapper, LazyResolver, LazyValue, ParallelScheduler, Placeholder, Scheduler,
        SequentialScheduler, TaskGraph, TaskKey, TaskNode,
    };
    pub use crate::plugin::Plugin;
    pub use crate::resolver::{Resolver, ResolverScope};
    pub use crate::translator::{TranslationPath, Translator, TranslatorGraph};
    pub use crate::types::{AbstractType, ConcreteType, ConcreteTypeId, TypeRegistry};
    pub use crate::value::{NativeType, Value};
}

// Re-export key types at crate root
pub use algorithm::{AbstractAlgorithm, ConcreteAlgorithm, Param};
pub use dispatcher::{Dispatch, DispatchPlan};
pub use error::{KernelError, MetagraphError, Result, WrapperError};
pub use lazy::{LazyResolver, LazyValue, Placeholder};
pub use plugin::Plugin;
pub use resolver::{Resolver, ResolverScope};
pub use translator::{TranslationPath, Translator};
pub use types::{AbstractType, ConcreteType, ConcreteTypeId};
pub use value::{NativeType, Value};

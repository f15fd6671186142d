//! Eager resolver
//!
//! Owns the registries. Registration happens through `&mut self` before the
//! resolver is shared; every planning and call operation takes `&self`.

pub mod scope;

pub use scope::ResolverScope;

use std::sync::Arc;

use crate::algorithm::{AbstractAlgorithm, AlgorithmCatalog, ConcreteAlgorithm, ParamKind};
use crate::dispatcher::{ArgSignature, Dispatch, DispatchPlan, Dispatcher};
use crate::error::{MetagraphError, Result};
use crate::lazy::LazyValue;
use crate::plugin::Plugin;
use crate::translator::{TranslationPath, TranslatorGraph};
use crate::types::{ConcreteType, ConcreteTypeId, TypeRegistry};
use crate::value::Value;

/// What the planner knows about one argument before execution.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ArgProbe<'a> {
    /// A materialized value
    Ready(&'a Value),
    /// A deferred value, typed when it belongs to a concrete type
    Deferred(Option<&'a ConcreteTypeId>),
}

/// Registry owner and eager executor.
#[derive(Debug, Default)]
pub struct Resolver {
    types: TypeRegistry,
    translators: TranslatorGraph,
    algorithms: AlgorithmCatalog,
    plugins: Vec<String>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound translation chains to `max_hops` steps.
    pub fn with_max_translation_hops(mut self, max_hops: usize) -> Self {
        self.translators.set_max_hops(Some(max_hops));
        self
    }

    /// Register one plugin bundle.
    ///
    /// Contents are registered in dependency order: abstract types, concrete
    /// types, wrappers, translators, abstract algorithms, concrete algorithms.
    pub fn register(&mut self, plugin: Plugin) -> Result<()> {
        if self.plugins.iter().any(|p| p == &plugin.name) {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "plugin {}",
                plugin.name
            )));
        }

        let counts = (
            plugin.concrete_types.len() + plugin.wrappers.len(),
            plugin.translators.len(),
            plugin.concrete_algorithms.len(),
        );

        for abstract_type in plugin.abstract_types {
            self.types.register_abstract(abstract_type)?;
        }
        for concrete in plugin.concrete_types {
            self.types.register_concrete(concrete)?;
        }
        for wrapper in plugin.wrappers {
            if !wrapper.is_wrapper() {
                return Err(MetagraphError::InvalidRegistration(format!(
                    "{} is listed as a wrapper but was not declared as one",
                    wrapper.id()
                )));
            }
            self.types.register_concrete(wrapper)?;
        }
        for translator in plugin.translators {
            for endpoint in [translator.src(), translator.dst()] {
                if !self.types.contains(endpoint) {
                    return Err(MetagraphError::InvalidRegistration(format!(
                        "translator {} uses unregistered concrete type {}",
                        translator.name(),
                        endpoint
                    )));
                }
            }
            self.translators.add(translator)?;
        }
        for algorithm in plugin.abstract_algorithms {
            self.algorithms.register_abstract(algorithm, &self.types)?;
        }
        for algorithm in plugin.concrete_algorithms {
            self.algorithms
                .register_concrete(algorithm.in_plugin(&plugin.name), &self.types)?;
        }

        tracing::info!(
            plugin = %plugin.name,
            concrete_types = counts.0,
            translators = counts.1,
            algorithms = counts.2,
            "plugin registered"
        );
        self.plugins.push(plugin.name);
        Ok(())
    }

    pub fn register_all(&mut self, plugins: impl IntoIterator<Item = Plugin>) -> Result<()> {
        plugins.into_iter().try_for_each(|plugin| self.register(plugin))
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn translators(&self) -> &TranslatorGraph {
        &self.translators
    }

    pub fn algorithms(&self) -> &AlgorithmCatalog {
        &self.algorithms
    }

    /// Registered plugin names in registration order
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn classify(&self, value: &Value) -> Result<ConcreteTypeId> {
        self.types.classify(value)
    }

    pub fn concrete_type(&self, id: &ConcreteTypeId) -> Result<&Arc<ConcreteType>> {
        self.types.require(id)
    }

    /// Evaluate an abstract property, e.g. `is_directed`, on a value.
    pub fn compute_property(&self, value: &Value, name: &str) -> Result<serde_json::Value> {
        let id = self.classify(value)?;
        let concrete = self.types.require(&id)?;
        let compute = concrete.property(name).ok_or_else(|| {
            MetagraphError::invalid_argument(
                "compute_property",
                format!("{} does not compute property '{}'", id, name),
            )
        })?;
        compute(value).map_err(|err| MetagraphError::kernel(format!("property {}", name), err))
    }

    /// Compare two values under their shared concrete type's equality.
    ///
    /// Values of different concrete types are never equal.
    pub fn values_equal(&self, a: &Value, b: &Value) -> Result<bool> {
        let left = self.classify(a)?;
        let right = self.classify(b)?;
        if left != right {
            tracing::debug!(left = %left, right = %right, "equality across concrete types");
            return Ok(false);
        }
        let concrete = self.types.require(&left)?;
        let equality = concrete
            .equality()
            .ok_or_else(|| MetagraphError::UnsupportedEquality(left.clone()))?;
        Ok(equality(a, b))
    }

    pub fn plan_translation(
        &self,
        src: &ConcreteTypeId,
        dst: &ConcreteTypeId,
    ) -> Result<TranslationPath> {
        self.types.require(src)?;
        self.types.require(dst)?;
        self.translators.find_path(src, dst, false)
    }

    /// Plan a translation whose result must be re-verified against `dst`.
    pub fn plan_translation_exact(
        &self,
        src: &ConcreteTypeId,
        dst: &ConcreteTypeId,
    ) -> Result<TranslationPath> {
        self.types.require(src)?;
        self.types.require(dst)?;
        self.translators.find_path(src, dst, true)
    }

    /// Execute a planned chain, re-verifying membership when the path asks for it.
    pub fn run_translation(&self, path: &TranslationPath, value: Value) -> Result<Value> {
        let out = path.translate(value)?;
        if path.requires_verification() {
            self.types.verify(&out, path.dst())?;
        }
        Ok(out)
    }

    /// Convert `value` into `dst`. Already-matching values are returned as-is.
    pub fn translate(&self, value: Value, dst: impl Into<ConcreteTypeId>) -> Result<Value> {
        let dst = dst.into();
        let src = self.classify(&value)?;
        let path = self.plan_translation(&src, &dst)?;
        if path.is_identity() {
            return Ok(value);
        }
        tracing::debug!(src = %src, dst = %dst, hops = path.hops(), "translating value");
        self.run_translation(&path, value)
    }

    pub fn abstract_algorithm(&self, path: &str) -> Result<Arc<AbstractAlgorithm>> {
        self.algorithms
            .abstract_algorithm(path)
            .cloned()
            .ok_or_else(|| MetagraphError::UnknownAlgorithm(path.to_string()))
    }

    /// Split a dotted call path into its abstract algorithm and dispatch mode.
    ///
    /// `centrality.pagerank` dispatches generally;
    /// `centrality.pagerank.core_networkx` dispatches exactly to that plugin.
    pub fn route(&self, path: &str) -> Result<(Arc<AbstractAlgorithm>, Dispatch)> {
        if let Some(signature) = self.algorithms.abstract_algorithm(path) {
            return Ok((Arc::clone(signature), Dispatch::General));
        }
        if let Some((prefix, plugin)) = path.rsplit_once('.') {
            if let Some(signature) = self.algorithms.abstract_algorithm(prefix) {
                if self.algorithms.has_plugin(prefix, plugin) {
                    return Ok((Arc::clone(signature), Dispatch::exact(plugin)));
                }
            }
        }
        Err(MetagraphError::UnknownAlgorithm(path.to_string()))
    }

    /// Call an algorithm by dotted path, with an optional plugin suffix.
    pub fn call(&self, path: &str, args: Vec<Value>) -> Result<Value> {
        let (signature, dispatch) = self.route(path)?;
        self.execute(&signature, args, &dispatch)
    }

    /// Call the named plugin's implementation, translating where needed.
    pub fn call_exact(&self, path: &str, plugin: &str, args: Vec<Value>) -> Result<Value> {
        self.dispatch(path, args, &Dispatch::exact(plugin))
    }

    pub fn dispatch(&self, path: &str, args: Vec<Value>, dispatch: &Dispatch) -> Result<Value> {
        let signature = self.abstract_algorithm(path)?;
        self.execute(&signature, args, dispatch)
    }

    /// Plan a call without executing it.
    pub fn plan_call(&self, path: &str, args: &[Value]) -> Result<DispatchPlan> {
        let (signature, dispatch) = self.route(path)?;
        let args = signature.bind(args.to_vec())?;
        let probes: Vec<ArgProbe<'_>> = args.iter().map(ArgProbe::Ready).collect();
        self.plan(&signature, &probes, &dispatch)
    }

    /// The implementation of `plugin` that accepts `args` without translation.
    pub fn find_algorithm_exact(
        &self,
        path: &str,
        plugin: &str,
        args: &[Value],
    ) -> Result<Arc<ConcreteAlgorithm>> {
        let signature = self.abstract_algorithm(path)?;
        let args = signature.bind(args.to_vec())?;
        let probes: Vec<ArgProbe<'_>> = args.iter().map(ArgProbe::Ready).collect();
        let plan = self.plan(&signature, &probes, &Dispatch::exact_strict(plugin))?;
        Ok(Arc::clone(plan.algorithm()))
    }

    pub(crate) fn plan(
        &self,
        signature: &AbstractAlgorithm,
        probes: &[ArgProbe<'_>],
        dispatch: &Dispatch,
    ) -> Result<DispatchPlan> {
        let args = self.signatures(signature, probes)?;
        Dispatcher::new(&self.algorithms, &self.translators).resolve(signature, &args, dispatch)
    }

    fn execute(
        &self,
        signature: &AbstractAlgorithm,
        args: Vec<Value>,
        dispatch: &Dispatch,
    ) -> Result<Value> {
        let args = signature.bind(args)?;
        let plan = {
            let probes: Vec<ArgProbe<'_>> = args.iter().map(ArgProbe::Ready).collect();
            self.plan(signature, &probes, dispatch)?
        };

        let mut inputs = Vec::with_capacity(args.len());
        for (arg, translation) in args.into_iter().zip(plan.translations()) {
            inputs.push(match translation {
                Some(path) => self.run_translation(path, arg)?,
                None => arg,
            });
        }

        self.apply_algorithm(plan.algorithm(), inputs).inspect_err(|err| {
            tracing::warn!(
                algorithm = %signature.path(),
                plugin = %plan.algorithm().plugin(),
                error = %err,
                "algorithm failed"
            );
        })
    }

    /// Run one concrete implementation on arguments it already accepts.
    ///
    /// Resolver-aware implementations receive this resolver for nested calls.
    pub fn apply_algorithm(
        &self,
        algorithm: &ConcreteAlgorithm,
        args: Vec<Value>,
    ) -> Result<Value> {
        if !algorithm.includes_resolver() {
            return algorithm.call(args).map_err(|err| {
                MetagraphError::kernel(format!("algorithm {}", algorithm.name()), err)
            });
        }
        let args = args.into_iter().map(LazyValue::from).collect();
        let out = algorithm.call_in(&ResolverScope::Eager(self), args)?;
        scope::ready(algorithm.name(), out)
    }

    fn signatures(
        &self,
        signature: &AbstractAlgorithm,
        probes: &[ArgProbe<'_>],
    ) -> Result<Vec<ArgSignature>> {
        signature
            .params()
            .iter()
            .zip(probes)
            .map(|(param, probe)| match (param.kind(), probe) {
                (ParamKind::Abstract(expected), probe) => {
                    let ty = match probe {
                        ArgProbe::Ready(value) => self.classify(value)?,
                        ArgProbe::Deferred(Some(ty)) => (*ty).clone(),
                        ArgProbe::Deferred(None) => {
                            return Err(MetagraphError::invalid_argument(
                                signature.path(),
                                format!(
                                    "'{}' must be a {}, received a plain value",
                                    param.name(),
                                    expected
                                ),
                            ))
                        }
                    };
                    let found = self.types.require(&ty)?.abstract_type();
                    if found != expected.as_str() {
                        return Err(MetagraphError::invalid_argument(
                            signature.path(),
                            format!(
                                "'{}' must be a {}, received {} ({})",
                                param.name(),
                                expected,
                                ty,
                                found
                            ),
                        ));
                    }
                    Ok(ArgSignature::Typed(ty))
                }
                (ParamKind::Value(Some(native)), ArgProbe::Ready(value)) => {
                    if value.native_type() != *native {
                        return Err(MetagraphError::invalid_argument(
                            signature.path(),
                            format!(
                                "'{}' must be {}, received {}",
                                param.name(),
                                native,
                                value.type_name()
                            ),
                        ));
                    }
                    Ok(ArgSignature::Value)
                }
                (ParamKind::Value(_), _) => Ok(ArgSignature::Value),
            })
            .collect()
    }
}

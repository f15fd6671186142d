//! Algorithm catalog
//!
//! - AbstractAlgorithm: dotted path + parameter signature, no body
//! - ConcreteAlgorithm: one plugin's implementation for specific concrete types
//! - AlgorithmCatalog: both, indexed by path, in registration order

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{KernelError, MetagraphError, Result};
use crate::lazy::LazyValue;
use crate::resolver::scope::{self, ResolverScope};
use crate::types::{ConcreteTypeId, TypeRegistry};
use crate::value::{NativeType, Value};

/// Algorithm body. Receives arguments in signature order.
pub type AlgorithmFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, KernelError> + Send + Sync>;

/// Body that makes nested calls through the resolver running it.
pub type ScopedAlgorithmFn =
    Arc<dyn Fn(&ResolverScope<'_>, Vec<LazyValue>) -> Result<LazyValue> + Send + Sync>;

#[derive(Clone)]
enum Body {
    Kernel(AlgorithmFn),
    Scoped(ScopedAlgorithmFn),
}

/// What an abstract parameter accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Any concrete type of the named abstract type; takes part in dispatch
    Abstract(String),
    /// A plain value passed through untouched, optionally of one native type
    Value(Option<NativeType>),
}

/// One parameter of an abstract algorithm
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<Value>,
}

impl Param {
    pub fn typed(name: impl Into<String>, abstract_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Abstract(abstract_type.into()),
            default: None,
        }
    }

    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Value(None),
            default: None,
        }
    }

    pub fn value_of<T: Any>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Value(Some(NativeType::of::<T>())),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Return description of an abstract algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    Abstract(String),
    Value,
}

/// Named signature with no implementation.
#[derive(Debug, Clone)]
pub struct AbstractAlgorithm {
    path: String,
    params: Vec<Param>,
    returns: Returns,
}

impl AbstractAlgorithm {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            returns: Returns::Value,
        }
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returning(mut self, abstract_type: impl Into<String>) -> Self {
        self.returns = Returns::Abstract(abstract_type.into());
        self
    }

    pub fn returning_value(mut self) -> Self {
        self.returns = Returns::Value;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the dotted path
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> &Returns {
        &self.returns
    }

    /// Fill trailing defaults and check arity.
    pub fn bind<T: From<Value>>(&self, mut args: Vec<T>) -> Result<Vec<T>> {
        if args.len() > self.params.len() {
            return Err(MetagraphError::invalid_argument(
                &self.path,
                format!(
                    "expected at most {} arguments, received {}",
                    self.params.len(),
                    args.len()
                ),
            ));
        }
        for param in &self.params[args.len()..] {
            match &param.default {
                Some(default) => args.push(T::from(default.clone())),
                None => {
                    return Err(MetagraphError::invalid_argument(
                        &self.path,
                        format!("missing required argument '{}'", param.name),
                    ))
                }
            }
        }
        Ok(args)
    }
}

/// What a concrete implementation accepts at one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepts {
    /// Any of these concrete types, in order of preference
    Concrete(Vec<ConcreteTypeId>),
    Value,
}

/// What a concrete implementation produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Concrete(ConcreteTypeId),
    Value,
}

/// One plugin's implementation of an abstract algorithm.
#[derive(Clone)]
pub struct ConcreteAlgorithm {
    name: String,
    abstract_path: String,
    plugin: String,
    accepts: Vec<Accepts>,
    output: Output,
    body: Body,
}

impl ConcreteAlgorithm {
    pub fn new(
        name: impl Into<String>,
        abstract_path: impl Into<String>,
        func: impl Fn(Vec<Value>) -> Result<Value, KernelError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_body(name.into(), abstract_path.into(), Body::Kernel(Arc::new(func)))
    }

    /// Implementation that receives the active resolver.
    ///
    /// Run eagerly, its nested calls execute at once; recorded lazily, they
    /// become tasks of the caller's graph.
    pub fn with_resolver(
        name: impl Into<String>,
        abstract_path: impl Into<String>,
        func: impl Fn(&ResolverScope<'_>, Vec<LazyValue>) -> Result<LazyValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::with_body(name.into(), abstract_path.into(), Body::Scoped(Arc::new(func)))
    }

    fn with_body(name: String, abstract_path: String, body: Body) -> Self {
        Self {
            name,
            abstract_path,
            plugin: String::new(),
            accepts: Vec::new(),
            output: Output::Value,
            body,
        }
    }

    /// Next positional parameter accepts exactly `ty`.
    pub fn accepting(mut self, ty: impl Into<ConcreteTypeId>) -> Self {
        self.accepts.push(Accepts::Concrete(vec![ty.into()]));
        self
    }

    /// Next positional parameter accepts any of `types`.
    pub fn accepting_any<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ConcreteTypeId>,
    {
        self.accepts
            .push(Accepts::Concrete(types.into_iter().map(Into::into).collect()));
        self
    }

    /// Next positional parameter is a plain value.
    pub fn accepting_value(mut self) -> Self {
        self.accepts.push(Accepts::Value);
        self
    }

    pub fn returning(mut self, ty: impl Into<ConcreteTypeId>) -> Self {
        self.output = Output::Concrete(ty.into());
        self
    }

    pub fn returning_value(mut self) -> Self {
        self.output = Output::Value;
        self
    }

    pub(crate) fn in_plugin(mut self, plugin: &str) -> Self {
        self.plugin = plugin.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abstract_path(&self) -> &str {
        &self.abstract_path
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn accepts(&self) -> &[Accepts] {
        &self.accepts
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn includes_resolver(&self) -> bool {
        matches!(self.body, Body::Scoped(_))
    }

    /// Run a plain kernel. Resolver-aware bodies need [`ConcreteAlgorithm::call_in`].
    pub fn call(&self, args: Vec<Value>) -> Result<Value, KernelError> {
        match &self.body {
            Body::Kernel(func) => func(args),
            Body::Scoped(_) => Err(KernelError::failed(format!(
                "{} needs a resolver to run",
                self.name
            ))),
        }
    }

    /// Run under `scope`. Plain kernels ignore the scope and need ready values.
    pub fn call_in(&self, scope: &ResolverScope<'_>, args: Vec<LazyValue>) -> Result<LazyValue> {
        match &self.body {
            Body::Scoped(func) => func(scope, args),
            Body::Kernel(func) => {
                let args = args
                    .into_iter()
                    .map(|arg| scope::ready(&self.name, arg))
                    .collect::<Result<Vec<_>>>()?;
                func(args)
                    .map(LazyValue::Ready)
                    .map_err(|err| MetagraphError::kernel(format!("algorithm {}", self.name), err))
            }
        }
    }
}

impl fmt::Debug for ConcreteAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteAlgorithm")
            .field("name", &self.name)
            .field("abstract_path", &self.abstract_path)
            .field("plugin", &self.plugin)
            .field("accepts", &self.accepts)
            .field("output", &self.output)
            .field("includes_resolver", &self.includes_resolver())
            .finish()
    }
}

/// Abstract algorithms and their implementations.
#[derive(Debug, Default)]
pub struct AlgorithmCatalog {
    abstracts: HashMap<String, Arc<AbstractAlgorithm>>,
    implementations: HashMap<String, Vec<Arc<ConcreteAlgorithm>>>,
}

impl AlgorithmCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_abstract(
        &mut self,
        algorithm: AbstractAlgorithm,
        types: &TypeRegistry,
    ) -> Result<()> {
        if self.abstracts.contains_key(algorithm.path()) {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "abstract algorithm {}",
                algorithm.path()
            )));
        }
        let declared = algorithm
            .params()
            .iter()
            .filter_map(|p| match p.kind() {
                ParamKind::Abstract(name) => Some(name.as_str()),
                ParamKind::Value(_) => None,
            })
            .chain(match algorithm.returns() {
                Returns::Abstract(name) => Some(name.as_str()),
                Returns::Value => None,
            });
        for name in declared {
            if types.abstract_type(name).is_none() {
                return Err(MetagraphError::InvalidRegistration(format!(
                    "abstract algorithm {} refers to unregistered abstract type {}",
                    algorithm.path(),
                    name
                )));
            }
        }
        self.abstracts
            .insert(algorithm.path().to_string(), Arc::new(algorithm));
        Ok(())
    }

    /// Register an implementation after checking it against its abstract signature
    pub fn register_concrete(
        &mut self,
        algorithm: ConcreteAlgorithm,
        types: &TypeRegistry,
    ) -> Result<()> {
        let Some(signature) = self.abstracts.get(algorithm.abstract_path()) else {
            return Err(MetagraphError::InvalidRegistration(format!(
                "{} implements unregistered abstract algorithm {}",
                algorithm.name(),
                algorithm.abstract_path()
            )));
        };

        let invalid = |message: String| {
            MetagraphError::InvalidRegistration(format!(
                "{} ({}): {}",
                algorithm.name(),
                algorithm.abstract_path(),
                message
            ))
        };

        if signature.params().len() != algorithm.accepts().len() {
            return Err(invalid(format!(
                "declares {} parameters, abstract signature has {}",
                algorithm.accepts().len(),
                signature.params().len()
            )));
        }

        for (param, accepts) in signature.params().iter().zip(algorithm.accepts()) {
            match (param.kind(), accepts) {
                (ParamKind::Abstract(abstract_type), Accepts::Concrete(choices)) => {
                    if choices.is_empty() {
                        return Err(invalid(format!("'{}' accepts no types", param.name())));
                    }
                    for choice in choices {
                        check_concrete(types, choice, abstract_type)
                            .map_err(|msg| invalid(format!("'{}' {}", param.name(), msg)))?;
                    }
                }
                (ParamKind::Value(_), Accepts::Value) => {}
                _ => {
                    return Err(invalid(format!(
                        "'{}' does not match the abstract parameter kind",
                        param.name()
                    )))
                }
            }
        }

        match (signature.returns(), algorithm.output()) {
            (Returns::Abstract(abstract_type), Output::Concrete(ty)) => {
                check_concrete(types, ty, abstract_type)
                    .map_err(|msg| invalid(format!("return {}", msg)))?;
            }
            (Returns::Value, Output::Value) => {}
            _ => return Err(invalid("return does not match the abstract signature".into())),
        }

        let implementations = self
            .implementations
            .entry(algorithm.abstract_path().to_string())
            .or_default();
        if implementations
            .iter()
            .any(|c| c.plugin() == algorithm.plugin() && c.name() == algorithm.name())
        {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "concrete algorithm {} in plugin {}",
                algorithm.name(),
                algorithm.plugin()
            )));
        }
        implementations.push(Arc::new(algorithm));
        Ok(())
    }

    pub fn abstract_algorithm(&self, path: &str) -> Option<&Arc<AbstractAlgorithm>> {
        self.abstracts.get(path)
    }

    /// Implementations of `path` in registration order
    pub fn implementations(&self, path: &str) -> &[Arc<ConcreteAlgorithm>] {
        self.implementations
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_plugin(&self, path: &str, plugin: &str) -> bool {
        self.implementations(path).iter().any(|c| c.plugin() == plugin)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.abstracts.keys().map(String::as_str)
    }
}

fn check_concrete(
    types: &TypeRegistry,
    ty: &ConcreteTypeId,
    abstract_type: &str,
) -> std::result::Result<(), String> {
    match types.concrete_type(ty) {
        None => Err(format!("uses unregistered concrete type {}", ty)),
        Some(concrete) if concrete.abstract_type() != abstract_type => Err(format!(
            "uses {} which is a {}, not a {}",
            ty,
            concrete.abstract_type(),
            abstract_type
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbstractType, ConcreteType};

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .register_abstract(AbstractType::new("Number"))
            .expect("abstract");
        types
            .register_concrete(ConcreteType::new::<i64>("IntType", "Number"))
            .expect("int");
        types
    }

    fn double() -> ConcreteAlgorithm {
        ConcreteAlgorithm::new("int_double", "arith.double", |args| {
            Ok(Value::new(args[0].cast::<i64>()? * 2))
        })
        .accepting("IntType")
        .returning("IntType")
    }

    #[test]
    fn test_bind_fills_defaults_and_checks_arity() {
        let algorithm = AbstractAlgorithm::new("arith.scale")
            .with_param(Param::typed("x", "Number"))
            .with_param(Param::value_of::<f64>("factor").with_default(Value::new(2.0f64)));

        let bound = algorithm.bind(vec![Value::new(1i64)]).expect("bind");
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[1].cast::<f64>().expect("default"), &2.0);

        let err = algorithm.bind(Vec::<Value>::new()).expect_err("missing");
        assert!(err.to_string().contains("missing required argument 'x'"));
        let err = algorithm
            .bind(vec![Value::new(1i64), Value::new(1.0f64), Value::new(0i64)])
            .expect_err("too many");
        assert!(matches!(err, MetagraphError::InvalidArgument { .. }));
    }

    #[test]
    fn test_concrete_must_match_abstract_signature() {
        let types = types();
        let mut catalog = AlgorithmCatalog::new();
        let err = catalog
            .register_concrete(double(), &types)
            .expect_err("no abstract");
        assert!(matches!(err, MetagraphError::InvalidRegistration(_)));

        catalog
            .register_abstract(
                AbstractAlgorithm::new("arith.double")
                    .with_param(Param::typed("x", "Number"))
                    .returning("Number"),
                &types,
            )
            .expect("abstract");
        catalog
            .register_concrete(double().in_plugin("example"), &types)
            .expect("concrete");
        assert_eq!(catalog.implementations("arith.double").len(), 1);
        assert!(catalog.has_plugin("arith.double", "example"));

        let err = catalog
            .register_concrete(double().in_plugin("example"), &types)
            .expect_err("duplicate");
        assert!(matches!(err, MetagraphError::DuplicateRegistration(_)));

        let wrong_arity = ConcreteAlgorithm::new("bad", "arith.double", |_| Ok(Value::new(0i64)))
            .accepting("IntType")
            .accepting_value()
            .returning("IntType");
        assert!(catalog.register_concrete(wrong_arity, &types).is_err());
    }

    #[test]
    fn test_abstract_algorithm_name_is_last_segment() {
        assert_eq!(
            AbstractAlgorithm::new("util.graph.filter_edges").name(),
            "filter_edges"
        );
        assert_eq!(AbstractAlgorithm::new("ln").name(), "ln");
    }
}

//! Lazy execution layer
//!
//! [`LazyResolver`] plans exactly like [`Resolver`] but records a task graph
//! instead of running anything. Every call returns a [`Placeholder`]:
//! - one task per translation hop per argument
//! - one task for the algorithm
//! - ready arguments are embedded as literals, placeholders are merged in

mod graph;
mod placeholder;
mod scheduler;

pub use graph::{TaskGraph, TaskInput, TaskKey, TaskNode, TaskOp};
pub use placeholder::{LazyValue, Placeholder};
pub use scheduler::{NodeState, ParallelScheduler, Scheduler, SequentialScheduler};

use std::fmt;
use std::sync::Arc;

use crate::algorithm::{AbstractAlgorithm, ConcreteAlgorithm, Output};
use crate::dispatcher::Dispatch;
use crate::error::{MetagraphError, Result};
use crate::resolver::{ArgProbe, Resolver, ResolverScope};
use crate::translator::{TranslationPath, Translator};
use crate::types::{ConcreteTypeId, ConstructorFn};
use crate::value::Value;

/// Deferred front end over a shared [`Resolver`].
#[derive(Clone)]
pub struct LazyResolver {
    resolver: Arc<Resolver>,
    scheduler: Arc<dyn Scheduler>,
}

impl LazyResolver {
    /// Uses the [`SequentialScheduler`] until another is configured.
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            scheduler: Arc::new(SequentialScheduler),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Record a translation of `arg` into `dst`.
    ///
    /// When `arg` already has type `dst` it is returned unchanged.
    pub fn translate(
        &self,
        arg: impl Into<LazyValue>,
        dst: impl Into<ConcreteTypeId>,
    ) -> Result<LazyValue> {
        let arg = arg.into();
        let dst = dst.into();
        let src = match arg.probe() {
            ArgProbe::Ready(value) => self.resolver.classify(value)?,
            ArgProbe::Deferred(Some(ty)) => ty.clone(),
            ArgProbe::Deferred(None) => {
                return Err(MetagraphError::UnknownType(
                    "placeholder for a plain value".to_string(),
                ))
            }
        };

        let path = self.resolver.plan_translation(&src, &dst)?;
        let out = self.record_path(arg, &path);
        if let LazyValue::Deferred(placeholder) = &out {
            tracing::debug!(
                src = %src,
                dst = %dst,
                hops = path.hops(),
                tasks = placeholder.task_count(),
                "translation recorded"
            );
        }
        Ok(out)
    }

    /// Record a call by dotted path, with an optional plugin suffix.
    pub fn call(&self, path: &str, args: Vec<LazyValue>) -> Result<Placeholder> {
        let (signature, dispatch) = self.resolver.route(path)?;
        self.record(&signature, args, &dispatch)
    }

    pub fn call_exact(
        &self,
        path: &str,
        plugin: &str,
        args: Vec<LazyValue>,
    ) -> Result<Placeholder> {
        self.dispatch(path, args, &Dispatch::exact(plugin))
    }

    pub fn dispatch(
        &self,
        path: &str,
        args: Vec<LazyValue>,
        dispatch: &Dispatch,
    ) -> Result<Placeholder> {
        let signature = self.resolver.abstract_algorithm(path)?;
        self.record(&signature, args, dispatch)
    }

    /// Deferred constructor for a registered wrapper type.
    pub fn delayed_wrapper(
        &self,
        concrete_type: impl Into<ConcreteTypeId>,
    ) -> Result<DelayedWrapper> {
        let concrete_type = concrete_type.into();
        let constructor = self
            .wrapper_type(&concrete_type)?
            .constructor()
            .cloned()
            .ok_or_else(|| {
                MetagraphError::invalid_argument(
                    "delayed_wrapper",
                    format!("{} has no registered constructor", concrete_type),
                )
            })?;
        Ok(self.build_wrapper(concrete_type, constructor))
    }

    /// Deferred wrapper using a caller-supplied constructor.
    pub fn delayed_wrapper_with(
        &self,
        concrete_type: impl Into<ConcreteTypeId>,
        constructor: ConstructorFn,
    ) -> Result<DelayedWrapper> {
        let concrete_type = concrete_type.into();
        self.wrapper_type(&concrete_type)?;
        Ok(self.build_wrapper(concrete_type, constructor))
    }

    /// Materialize both sides and compare them.
    pub async fn values_equal(&self, a: &LazyValue, b: &LazyValue) -> Result<bool> {
        let left = a.compute().await?;
        let right = b.compute().await?;
        self.resolver.values_equal(&left, &right)
    }

    fn wrapper_type(
        &self,
        concrete_type: &ConcreteTypeId,
    ) -> Result<&Arc<crate::types::ConcreteType>> {
        match self.resolver.types().concrete_type(concrete_type) {
            Some(concrete) if concrete.is_wrapper() => Ok(concrete),
            _ => Err(MetagraphError::UnknownType(format!(
                "wrapper type {}",
                concrete_type
            ))),
        }
    }

    fn build_wrapper(
        &self,
        concrete_type: ConcreteTypeId,
        constructor: ConstructorFn,
    ) -> DelayedWrapper {
        DelayedWrapper {
            concrete_type,
            constructor,
            scheduler: Arc::clone(&self.scheduler),
        }
    }

    /// Record one translator applied to `arg`, bypassing path planning.
    pub fn apply_translator(
        &self,
        translator: &Arc<Translator>,
        arg: impl Into<LazyValue>,
    ) -> Placeholder {
        let mut graph = TaskGraph::new();
        let input = arg.into().absorb_into(&mut graph);
        let key = graph.push(TaskNode::translate(Arc::clone(translator), input));
        Placeholder::new(
            Some(translator.dst().clone()),
            key,
            graph,
            Arc::clone(&self.scheduler),
        )
    }

    /// Record one concrete implementation applied to arguments it accepts.
    ///
    /// Resolver-aware implementations run now with this resolver, so only
    /// their nested calls are recorded.
    pub fn apply_algorithm(
        &self,
        algorithm: &Arc<ConcreteAlgorithm>,
        args: Vec<LazyValue>,
    ) -> Result<Placeholder> {
        let concrete_type = match algorithm.output() {
            Output::Concrete(ty) => Some(ty.clone()),
            Output::Value => None,
        };
        if algorithm.includes_resolver() {
            let out = algorithm.call_in(&ResolverScope::Lazy(self), args)?;
            return Ok(match out {
                LazyValue::Deferred(placeholder) => placeholder,
                LazyValue::Ready(value) => {
                    Placeholder::from_value(concrete_type, value, Arc::clone(&self.scheduler))
                }
            });
        }

        let mut graph = TaskGraph::new();
        let inputs = args.iter().map(|arg| arg.absorb_into(&mut graph)).collect();
        let key = graph.push(TaskNode::algorithm(Arc::clone(algorithm), inputs));
        Ok(Placeholder::new(
            concrete_type,
            key,
            graph,
            Arc::clone(&self.scheduler),
        ))
    }

    /// One translate task per hop, chained onto `arg`.
    fn record_path(&self, arg: LazyValue, path: &TranslationPath) -> LazyValue {
        if path.is_identity() {
            return arg;
        }
        let mut graph = TaskGraph::new();
        let mut input = arg.absorb_into(&mut graph);
        for step in path.steps() {
            input = TaskInput::Task(graph.push(TaskNode::translate(Arc::clone(step), input)));
        }
        match input {
            TaskInput::Task(key) => Placeholder::new(
                Some(path.dst().clone()),
                key,
                graph,
                Arc::clone(&self.scheduler),
            )
            .into(),
            TaskInput::Literal(_) => arg,
        }
    }

    fn record(
        &self,
        signature: &AbstractAlgorithm,
        args: Vec<LazyValue>,
        dispatch: &Dispatch,
    ) -> Result<Placeholder> {
        let args = signature.bind(args)?;
        let plan = {
            let probes: Vec<ArgProbe<'_>> = args.iter().map(LazyValue::probe).collect();
            self.resolver.plan(signature, &probes, dispatch)?
        };

        let args = args
            .into_iter()
            .zip(plan.translations())
            .map(|(arg, translation)| match translation {
                Some(path) => self.record_path(arg, path),
                None => arg,
            })
            .collect();
        let algorithm = plan.algorithm();
        let placeholder = self.apply_algorithm(algorithm, args)?;
        tracing::debug!(
            algorithm = %signature.path(),
            plugin = %algorithm.plugin(),
            hops = plan.hops(),
            tasks = placeholder.task_count(),
            "algorithm call recorded"
        );
        Ok(placeholder)
    }
}

impl fmt::Debug for LazyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResolver")
            .field("plugins", &self.resolver.plugins())
            .finish()
    }
}

/// Records a single construct task per call.
#[derive(Clone)]
pub struct DelayedWrapper {
    concrete_type: ConcreteTypeId,
    constructor: ConstructorFn,
    scheduler: Arc<dyn Scheduler>,
}

impl DelayedWrapper {
    pub fn concrete_type(&self) -> &ConcreteTypeId {
        &self.concrete_type
    }

    pub fn call(&self, args: Vec<LazyValue>) -> Placeholder {
        let mut graph = TaskGraph::new();
        let inputs = args.iter().map(|arg| arg.absorb_into(&mut graph)).collect();
        let key = graph.push(TaskNode::construct(
            self.concrete_type.clone(),
            Arc::clone(&self.constructor),
            inputs,
        ));
        Placeholder::new(
            Some(self.concrete_type.clone()),
            key,
            graph,
            Arc::clone(&self.scheduler),
        )
    }

    /// Shorthand for a call whose inputs are all ready values.
    pub fn call_values(&self, args: Vec<Value>) -> Placeholder {
        self.call(args.into_iter().map(LazyValue::from).collect())
    }
}

impl fmt::Display for DelayedWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DelayedWrapper<{}>", self.concrete_type)
    }
}

impl fmt::Debug for DelayedWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{numeric_resolver, StrNum};

    fn lazy() -> LazyResolver {
        LazyResolver::new(Arc::new(numeric_resolver()))
    }

    fn strnum(text: &str) -> Value {
        Value::new(StrNum::new(text).expect("strnum"))
    }

    #[test]
    fn test_identity_translation_keeps_ready_value() {
        let lazy = lazy();
        let value = Value::new(3i64);
        let out = lazy.translate(value.clone(), "IntType").expect("identity");
        match out {
            LazyValue::Ready(inner) => assert!(inner.ptr_eq(&value)),
            LazyValue::Deferred(_) => panic!("identity translation should not defer"),
        }
    }

    #[test]
    fn test_translation_records_one_task_per_hop() {
        let lazy = lazy();
        let one_hop = lazy
            .translate(strnum("5"), "IntType")
            .expect("translate")
            .into_placeholder()
            .expect("deferred");
        assert_eq!(one_hop.task_count(), 1);
        assert_eq!(one_hop.concrete_type().map(|t| t.as_str()), Some("IntType"));

        let chained = lazy
            .translate(one_hop, "FloatType")
            .expect("translate")
            .into_placeholder()
            .expect("deferred");
        assert_eq!(chained.task_count(), 2);

        let direct = lazy
            .translate(strnum("5"), "FloatType")
            .expect("translate")
            .into_placeholder()
            .expect("deferred");
        assert_eq!(direct.task_count(), 2);

        let value = tokio_test::block_on(chained.compute()).expect("compute");
        assert_eq!(value.cast::<f64>().expect("float"), &5.0);
    }

    #[test]
    fn test_two_hop_argument_plus_algorithm_is_three_tasks() {
        let lazy = lazy();
        let result = lazy
            .call(
                "arith.power",
                vec![strnum("2").into(), Value::new(3.0f64).into()],
            )
            .expect("call");
        assert_eq!(result.task_count(), 3);
        assert_eq!(result.concrete_type().map(|t| t.as_str()), Some("FloatType"));

        let value = tokio_test::block_on(result.compute()).expect("compute");
        assert_eq!(value.cast::<f64>().expect("float"), &8.0);
    }

    #[test]
    fn test_placeholders_feed_later_calls() {
        let lazy = lazy();
        let first = lazy
            .call("arith.power", vec![Value::new(2i64).into(), Value::new(3i64).into()])
            .expect("first");
        assert_eq!(first.task_count(), 1);

        let second = lazy
            .call("arith.power", vec![first.into(), Value::new(2i64).into()])
            .expect("second");
        assert_eq!(second.task_count(), 2);

        let value = tokio_test::block_on(second.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &64);
    }

    #[test]
    fn test_planning_errors_surface_immediately() {
        let lazy = lazy();
        let err = lazy
            .call("ln", vec![Value::new(14i64).into()])
            .expect_err("ln");
        assert_eq!(
            err.to_string(),
            "No concrete algorithm for \"ln\" can be satisfied for the given inputs"
        );

        let err = lazy
            .call_exact("ln", "example_plugin", vec![Value::new(14i64).into()])
            .expect_err("exact");
        assert!(matches!(err, MetagraphError::ExactDispatchUnsatisfiable { .. }));
    }

    #[test]
    fn test_delayed_wrapper_records_construct_task() {
        let lazy = lazy();
        let wrapper = lazy.delayed_wrapper("StrNumType").expect("wrapper");
        assert_eq!(wrapper.to_string(), "DelayedWrapper<StrNumType>");

        let built = wrapper.call_values(vec![Value::new("42".to_string())]);
        assert_eq!(built.task_count(), 1);
        let doubled = lazy
            .call("arith.power", vec![built.into(), Value::new(2i64).into()])
            .expect("call");
        assert_eq!(doubled.task_count(), 3);
        let value = tokio_test::block_on(doubled.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &1764);

        assert!(matches!(
            lazy.delayed_wrapper("IntType"),
            Err(MetagraphError::UnknownType(_))
        ));
    }

    #[test]
    fn test_wrapper_validation_fails_at_compute() {
        let lazy = lazy();
        let wrapper = lazy.delayed_wrapper("StrNumType").expect("wrapper");
        let bad = wrapper.call_values(vec![Value::new("4x".to_string())]);
        let err = tokio_test::block_on(bad.compute()).expect_err("invalid digits");
        assert!(matches!(err, MetagraphError::Execution { .. }));
    }

    #[test]
    fn test_nested_calls_of_resolver_aware_algorithm_are_recorded() {
        let lazy = lazy();
        let cubed = lazy
            .call("arith.cube", vec![strnum("2").into()])
            .expect("record");
        assert_eq!(cubed.task_count(), 2);
        assert!(cubed.graph().iter().any(|node| matches!(
            node.op(),
            TaskOp::Algorithm(algorithm) if algorithm.name() == "int_power"
        )));
        assert_eq!(cubed.concrete_type().map(|t| t.as_str()), Some("IntType"));
        let value = tokio_test::block_on(cubed.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &8);
    }

    #[test]
    fn test_direct_translator_and_algorithm_calls_record_tasks() {
        let lazy = lazy();
        let translator = lazy
            .resolver()
            .translators()
            .get(&"StrNumType".into(), &"IntType".into())
            .cloned()
            .expect("translator");
        let num13: LazyValue = lazy.apply_translator(&translator, strnum("13")).into();
        assert_eq!(num13.placeholder().map(Placeholder::task_count), Some(1));

        let algorithm = lazy
            .resolver()
            .find_algorithm_exact(
                "arith.power",
                "example_plugin",
                &[Value::new(13i64), Value::new(13i64)],
            )
            .expect("exact");
        let result = lazy
            .apply_algorithm(&algorithm, vec![num13.clone(), num13])
            .expect("apply");
        assert_eq!(result.task_count(), 2);
        let value = tokio_test::block_on(result.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &302_875_106_592_253);
    }

    #[test]
    fn test_same_named_translators_stay_separate_tasks() {
        use crate::algorithm::Param;
        use crate::error::KernelError;
        use crate::plugin::Plugin;
        use crate::types::{AbstractType, ConcreteType};

        fn parse<T: std::str::FromStr>(value: &Value) -> Result<T, KernelError> {
            value
                .cast::<String>()?
                .parse()
                .map_err(|_| KernelError::failed("not a number"))
        }

        let plugin = Plugin::new("dup")
            .with_abstract_type(AbstractType::new("Scalar"))
            .with_concrete_type(ConcreteType::new::<String>("TextType", "Scalar"))
            .with_concrete_type(ConcreteType::new::<i32>("SmallType", "Scalar"))
            .with_concrete_type(ConcreteType::new::<i64>("BigType", "Scalar"))
            .with_translator(Translator::new("convert", "TextType", "SmallType", |v| {
                Ok(Value::new(parse::<i32>(&v)?))
            }))
            .with_translator(Translator::new("convert", "TextType", "BigType", |v| {
                Ok(Value::new(parse::<i64>(&v)? * 1000))
            }))
            .with_abstract_algorithm(
                AbstractAlgorithm::new("pair")
                    .with_param(Param::typed("a", "Scalar"))
                    .with_param(Param::typed("b", "Scalar"))
                    .returning_value(),
            )
            .with_concrete_algorithm(
                ConcreteAlgorithm::new("pair_impl", "pair", |args| {
                    let small = i64::from(*args[0].cast::<i32>()?);
                    Ok(Value::new(small + args[1].cast::<i64>()?))
                })
                .accepting("SmallType")
                .accepting("BigType")
                .returning_value(),
            );
        let mut resolver = Resolver::new();
        resolver.register(plugin).expect("register");
        let resolver = Arc::new(resolver);

        let text = Value::new("5".to_string());
        let eager = resolver
            .call("pair", vec![text.clone(), text.clone()])
            .expect("eager");
        assert_eq!(eager.cast::<i64>().expect("int"), &5005);

        let lazy = LazyResolver::new(resolver);
        let deferred = lazy
            .call("pair", vec![text.clone().into(), text.into()])
            .expect("record");
        assert_eq!(deferred.task_count(), 3);
        let value = tokio_test::block_on(deferred.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &5005);
    }

    #[test]
    fn test_persist_collapses_graph() {
        let lazy = lazy().with_scheduler(Arc::new(ParallelScheduler::new().with_max_parallel(2)));
        let result = lazy
            .call("arith.power", vec![strnum("3").into(), strnum("2").into()])
            .expect("call");
        assert_eq!(result.task_count(), 3);

        let persisted = tokio_test::block_on(result.persist()).expect("persist");
        assert_eq!(persisted.task_count(), 1);
        assert_eq!(persisted.key(), result.key());
        let value = tokio_test::block_on(persisted.compute()).expect("compute");
        assert_eq!(value.cast::<i64>().expect("int"), &9);
    }

    #[test]
    fn test_lazy_equality_computes_both_sides() {
        let lazy = lazy();
        let deferred: LazyValue = lazy
            .call("arith.power", vec![Value::new(3i64).into(), Value::new(2i64).into()])
            .expect("call")
            .into();
        let ready = LazyValue::from(Value::new(9i64));
        assert!(tokio_test::block_on(lazy.values_equal(&deferred, &ready)).expect("equal"));
    }
}

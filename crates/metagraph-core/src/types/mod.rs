//! Type definitions
//!
//! - AbstractType: semantic kind of data, e.g. "Graph"
//! - ConcreteType: one native representation of an abstract type
//! - TypeRegistry: classification of values into concrete types

mod registry;

pub use registry::TypeRegistry;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::KernelError;
use crate::value::{NativeType, Value};

/// Membership refinement on top of the native type check.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// Abstract property computation, e.g. `is_directed`.
pub type PropertyFn = Arc<dyn Fn(&Value) -> Result<serde_json::Value, KernelError> + Send + Sync>;
/// Representation-specific equality.
pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;
/// Wrapper constructor used by delayed wrappers.
pub type ConstructorFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, KernelError> + Send + Sync>;

/// Strongly-typed concrete type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConcreteTypeId(pub String);

impl ConcreteTypeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConcreteTypeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConcreteTypeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&ConcreteTypeId> for ConcreteTypeId {
    fn from(value: &ConcreteTypeId) -> Self {
        value.clone()
    }
}

impl fmt::Display for ConcreteTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConcreteTypeId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for ConcreteTypeId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Semantic kind of data with no representation of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractType {
    name: String,
    properties: Vec<String>,
}

impl AbstractType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Declare the abstract properties concrete types may compute.
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }
}

/// One representation of an abstract type.
#[derive(Clone)]
pub struct ConcreteType {
    id: ConcreteTypeId,
    abstract_type: String,
    native: NativeType,
    wrapper: bool,
    predicate: Option<PredicateFn>,
    properties: BTreeMap<String, PropertyFn>,
    equality: Option<EqualityFn>,
    constructor: Option<ConstructorFn>,
}

impl ConcreteType {
    /// Concrete type whose values are plain native `T` values.
    pub fn new<T: Any + Send + Sync>(
        id: impl Into<ConcreteTypeId>,
        abstract_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            abstract_type: abstract_type.into(),
            native: NativeType::of::<T>(),
            wrapper: false,
            predicate: None,
            properties: BTreeMap::new(),
            equality: None,
            constructor: None,
        }
    }

    /// Concrete type backed by a validating wrapper struct `T`.
    pub fn wrapper<T: Any + Send + Sync>(
        id: impl Into<ConcreteTypeId>,
        abstract_type: impl Into<String>,
    ) -> Self {
        Self {
            wrapper: true,
            ..Self::new::<T>(id, abstract_type)
        }
    }

    /// Narrow membership beyond the native type check.
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&Value) -> Result<serde_json::Value, KernelError> + Send + Sync + 'static,
    ) -> Self {
        self.properties.insert(name.into(), Arc::new(compute));
        self
    }

    pub fn with_equality(
        mut self,
        equality: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.equality = Some(Arc::new(equality));
        self
    }

    /// Use `PartialEq` of the native type `T` as equality.
    pub fn with_native_eq<T: Any + PartialEq>(self) -> Self {
        self.with_equality(|a, b| match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        })
    }

    pub fn with_constructor(
        mut self,
        constructor: impl Fn(Vec<Value>) -> Result<Value, KernelError> + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn id(&self) -> &ConcreteTypeId {
        &self.id
    }

    pub fn abstract_type(&self) -> &str {
        &self.abstract_type
    }

    pub fn native_type(&self) -> NativeType {
        self.native
    }

    pub fn is_wrapper(&self) -> bool {
        self.wrapper
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyFn> {
        self.properties.get(name)
    }

    pub fn equality(&self) -> Option<&EqualityFn> {
        self.equality.as_ref()
    }

    pub fn constructor(&self) -> Option<&ConstructorFn> {
        self.constructor.as_ref()
    }

    /// Whether `value` belongs to this concrete type.
    pub fn is_typeclass_of(&self, value: &Value) -> bool {
        value.native_type() == self.native
            && self.predicate.as_ref().map_or(true, |predicate| predicate(value))
    }
}

impl fmt::Debug for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcreteType")
            .field("id", &self.id)
            .field("abstract_type", &self.abstract_type)
            .field("native", &self.native.name())
            .field("wrapper", &self.wrapper)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

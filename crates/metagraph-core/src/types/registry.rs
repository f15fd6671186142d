//! TypeRegistry - abstract/concrete type index and value classification

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MetagraphError, Result};
use crate::value::Value;

use super::{AbstractType, ConcreteType, ConcreteTypeId};

/// Registry of abstract and concrete types.
///
/// Append-only: entries are added during registration and never removed.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    abstract_types: Vec<AbstractType>,
    abstract_index: HashMap<String, usize>,
    concrete_types: Vec<Arc<ConcreteType>>,
    concrete_index: HashMap<ConcreteTypeId, usize>,
    by_native: HashMap<TypeId, Vec<usize>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an abstract type
    pub fn register_abstract(&mut self, abstract_type: AbstractType) -> Result<()> {
        if self.abstract_index.contains_key(abstract_type.name()) {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "abstract type {}",
                abstract_type.name()
            )));
        }
        self.abstract_index
            .insert(abstract_type.name().to_string(), self.abstract_types.len());
        self.abstract_types.push(abstract_type);
        Ok(())
    }

    /// Register a concrete type under its declared abstract type
    pub fn register_concrete(&mut self, concrete: ConcreteType) -> Result<()> {
        let Some(abstract_type) = self.abstract_type(concrete.abstract_type()) else {
            return Err(MetagraphError::InvalidRegistration(format!(
                "concrete type {} claims unregistered abstract type {}",
                concrete.id(),
                concrete.abstract_type()
            )));
        };

        if let Some(property) = concrete
            .property_names()
            .find(|name| !abstract_type.has_property(name))
        {
            return Err(MetagraphError::InvalidRegistration(format!(
                "concrete type {} computes property '{}' which {} does not declare",
                concrete.id(),
                property,
                abstract_type.name()
            )));
        }

        if self.concrete_index.contains_key(concrete.id()) {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "concrete type {}",
                concrete.id()
            )));
        }

        let native_id = concrete.native_type().id();
        let same_representation = self
            .by_native
            .get(&native_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.concrete_types[idx])
            .find(|existing| existing.abstract_type() == concrete.abstract_type());
        if let Some(existing) = same_representation {
            return Err(MetagraphError::DuplicateRegistration(format!(
                "{} already represents {} as {}",
                concrete.native_type(),
                concrete.abstract_type(),
                existing.id()
            )));
        }

        let idx = self.concrete_types.len();
        self.concrete_index.insert(concrete.id().clone(), idx);
        self.by_native.entry(native_id).or_default().push(idx);
        self.concrete_types.push(Arc::new(concrete));
        Ok(())
    }

    pub fn abstract_type(&self, name: &str) -> Option<&AbstractType> {
        self.abstract_index
            .get(name)
            .map(|&idx| &self.abstract_types[idx])
    }

    pub fn concrete_type(&self, id: &ConcreteTypeId) -> Option<&Arc<ConcreteType>> {
        self.concrete_index
            .get(id)
            .map(|&idx| &self.concrete_types[idx])
    }

    /// Look up a concrete type, failing with `UnknownType`
    pub fn require(&self, id: &ConcreteTypeId) -> Result<&Arc<ConcreteType>> {
        self.concrete_type(id)
            .ok_or_else(|| MetagraphError::UnknownType(format!("concrete type {}", id)))
    }

    pub fn contains(&self, id: &ConcreteTypeId) -> bool {
        self.concrete_index.contains_key(id)
    }

    pub fn abstract_types(&self) -> impl Iterator<Item = &AbstractType> {
        self.abstract_types.iter()
    }

    /// Concrete types in registration order
    pub fn concrete_types(&self) -> impl Iterator<Item = &Arc<ConcreteType>> {
        self.concrete_types.iter()
    }

    /// Resolve the single concrete type a value belongs to
    pub fn classify(&self, value: &Value) -> Result<ConcreteTypeId> {
        let matches: Vec<&Arc<ConcreteType>> = self
            .by_native
            .get(&value.native_type().id())
            .into_iter()
            .flatten()
            .map(|&idx| &self.concrete_types[idx])
            .filter(|concrete| concrete.is_typeclass_of(value))
            .collect();

        match matches.as_slice() {
            [] => Err(MetagraphError::UnknownType(value.type_name().to_string())),
            [single] => Ok(single.id().clone()),
            many => Err(MetagraphError::AmbiguousType {
                native: value.type_name().to_string(),
                candidates: many
                    .iter()
                    .map(|c| c.id().as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Check that `value` belongs to `id`, used for exact re-verification
    pub fn verify(&self, value: &Value, id: &ConcreteTypeId) -> Result<()> {
        if self.require(id)?.is_typeclass_of(value) {
            Ok(())
        } else {
            Err(MetagraphError::UnknownType(format!(
                "{} is not an instance of {}",
                value.type_name(),
                id
            )))
        }
    }
}

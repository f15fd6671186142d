//! Plugin bundles
//!
//! A plugin groups everything one backend contributes. The resolver registers
//! bundle contents in dependency order, so a plugin may freely refer to types
//! declared earlier in the same bundle.

use crate::algorithm::{AbstractAlgorithm, ConcreteAlgorithm};
use crate::translator::Translator;
use crate::types::{AbstractType, ConcreteType};

/// Named registration bundle.
#[derive(Debug, Clone, Default)]
pub struct Plugin {
    pub(crate) name: String,
    pub(crate) abstract_types: Vec<AbstractType>,
    pub(crate) concrete_types: Vec<ConcreteType>,
    pub(crate) wrappers: Vec<ConcreteType>,
    pub(crate) translators: Vec<Translator>,
    pub(crate) abstract_algorithms: Vec<AbstractAlgorithm>,
    pub(crate) concrete_algorithms: Vec<ConcreteAlgorithm>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_abstract_type(mut self, abstract_type: AbstractType) -> Self {
        self.abstract_types.push(abstract_type);
        self
    }

    pub fn with_concrete_type(mut self, concrete: ConcreteType) -> Self {
        self.concrete_types.push(concrete);
        self
    }

    /// Add a concrete type built with [`ConcreteType::wrapper`].
    pub fn with_wrapper(mut self, wrapper: ConcreteType) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translators.push(translator);
        self
    }

    pub fn with_abstract_algorithm(mut self, algorithm: AbstractAlgorithm) -> Self {
        self.abstract_algorithms.push(algorithm);
        self
    }

    pub fn with_concrete_algorithm(mut self, algorithm: ConcreteAlgorithm) -> Self {
        self.concrete_algorithms.push(algorithm);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abstract_types(&self) -> &[AbstractType] {
        &self.abstract_types
    }

    pub fn concrete_types(&self) -> &[ConcreteType] {
        &self.concrete_types
    }

    pub fn wrappers(&self) -> &[ConcreteType] {
        &self.wrappers
    }

    pub fn translators(&self) -> &[Translator] {
        &self.translators
    }

    pub fn abstract_algorithms(&self) -> &[AbstractAlgorithm] {
        &self.abstract_algorithms
    }

    pub fn concrete_algorithms(&self) -> &[ConcreteAlgorithm] {
        &self.concrete_algorithms
    }
}

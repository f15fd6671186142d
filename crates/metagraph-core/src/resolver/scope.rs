//! The resolver handed to algorithms that make nested calls.
//!
//! Under the eager [`Resolver`] nested calls run immediately. Under the
//! [`LazyResolver`] they are recorded, so their tasks join the caller's graph.

use crate::error::{MetagraphError, Result};
use crate::lazy::{LazyResolver, LazyValue};
use crate::types::ConcreteTypeId;
use crate::value::Value;

use super::Resolver;

/// The resolver currently executing or recording a call.
#[derive(Debug, Clone, Copy)]
pub enum ResolverScope<'a> {
    Eager(&'a Resolver),
    Lazy(&'a LazyResolver),
}

impl<'a> ResolverScope<'a> {
    /// Registry shared by both modes
    pub fn resolver(&self) -> &'a Resolver {
        match self {
            Self::Eager(resolver) => resolver,
            Self::Lazy(lazy) => lazy.resolver(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    /// Call an algorithm by dotted path.
    pub fn call(&self, path: &str, args: Vec<LazyValue>) -> Result<LazyValue> {
        match self {
            Self::Eager(resolver) => {
                let args = args
                    .into_iter()
                    .map(|arg| ready(path, arg))
                    .collect::<Result<Vec<_>>>()?;
                resolver.call(path, args).map(LazyValue::Ready)
            }
            Self::Lazy(lazy) => lazy.call(path, args).map(LazyValue::Deferred),
        }
    }

    pub fn translate(&self, arg: LazyValue, dst: impl Into<ConcreteTypeId>) -> Result<LazyValue> {
        match self {
            Self::Eager(resolver) => {
                let value = ready("translate", arg)?;
                resolver.translate(value, dst).map(LazyValue::Ready)
            }
            Self::Lazy(lazy) => lazy.translate(arg, dst),
        }
    }
}

/// Unwrap a value handed to the eager resolver.
pub(crate) fn ready(context: &str, arg: LazyValue) -> Result<Value> {
    match arg {
        LazyValue::Ready(value) => Ok(value),
        LazyValue::Deferred(placeholder) => Err(MetagraphError::invalid_argument(
            context,
            format!(
                "placeholder {} cannot be passed to the eager resolver",
                placeholder.key()
            ),
        )),
    }
}

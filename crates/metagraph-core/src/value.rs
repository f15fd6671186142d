//! Value model
//!
//! A [`Value`] is a type-erased, shareable handle over a native Rust value.
//! Classification only ever looks at the native type and the predicates of
//! registered concrete types, so any `Send + Sync + 'static` type can flow
//! through the resolvers.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::KernelError;

/// Identity of a native Rust representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeType {
    id: TypeId,
    name: &'static str,
}

impl NativeType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared, immutable, type-erased value.
///
/// Clones share the underlying allocation and the token, which task keys use
/// to tell literal inputs apart.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    native: NativeType,
    token: Uuid,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            native: NativeType::of::<T>(),
            token: Uuid::new_v4(),
        }
    }

    pub fn native_type(&self) -> NativeType {
        self.native
    }

    pub fn type_name(&self) -> &'static str {
        self.native.name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.native.id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }

    /// Borrow the native value, reporting a kernel error on mismatch.
    pub fn cast<T: Any>(&self) -> Result<&T, KernelError> {
        self.downcast_ref::<T>()
            .ok_or_else(|| KernelError::UnexpectedValue {
                expected: std::any::type_name::<T>(),
                found: self.native.name,
            })
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.native.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_value_downcasts_to_native_type() {
        let value = Value::new(BTreeMap::from([(0u64, 1.5f64)]));
        assert!(value.is::<BTreeMap<u64, f64>>());
        let map = value.cast::<BTreeMap<u64, f64>>().expect("map");
        assert_eq!(map.get(&0), Some(&1.5));
    }

    #[test]
    fn test_cast_mismatch_reports_both_types() {
        let value = Value::new(42i64);
        let err = value.cast::<String>().expect_err("mismatch");
        let message = err.to_string();
        assert!(message.contains("String"));
        assert!(message.contains("i64"));
    }

    #[test]
    fn test_clones_share_token_and_allocation() {
        let value = Value::new(3.0f64);
        let copy = value.clone();
        assert_eq!(value.token(), copy.token());
        assert!(value.ptr_eq(&copy));
        assert_ne!(value.token(), Value::new(3.0f64).token());
    }
}

//! Plain `BTreeMap` node maps.

use std::collections::BTreeMap;

use metagraph_core::{ConcreteAlgorithm, ConcreteType, KernelError, Value};

use crate::catalog::{approx_eq, BinaryOp};

/// Node id to value.
pub type PythonNodeMap = BTreeMap<u64, f64>;

pub(crate) fn maps_equal(a: &PythonNodeMap, b: &PythonNodeMap) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && approx_eq(*va, *vb))
}

pub fn node_map_type() -> ConcreteType {
    ConcreteType::new::<PythonNodeMap>("PythonNodeMapType", "NodeMap").with_equality(|a, b| {
        match (a.downcast_ref::<PythonNodeMap>(), b.downcast_ref::<PythonNodeMap>()) {
            (Some(a), Some(b)) => maps_equal(a, b),
            _ => false,
        }
    })
}

/// Fold every value of the map with `func`.
pub fn reduce() -> ConcreteAlgorithm {
    ConcreteAlgorithm::new("python_reduce", "util.nodemap.reduce", |args| {
        let map = args
            .first()
            .ok_or(KernelError::MissingArgument(0))?
            .cast::<PythonNodeMap>()?;
        let func = args
            .get(1)
            .ok_or(KernelError::MissingArgument(1))?
            .cast::<BinaryOp>()?;
        let mut values = map.values().copied();
        let first = values
            .next()
            .ok_or_else(|| KernelError::failed("cannot reduce an empty node map"))?;
        Ok(Value::new(values.fold(first, |acc, v| func(acc, v))))
    })
    .accepting("PythonNodeMapType")
    .accepting_value()
    .returning_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::binary_op;

    #[test]
    fn test_reduce_sums_values() {
        let map: PythonNodeMap = BTreeMap::from([(0, 1.0), (1, 2.0)]);
        let out = reduce()
            .call(vec![Value::new(map), binary_op(|a, b| a + b)])
            .expect("reduce");
        assert_eq!(out.cast::<f64>().expect("float"), &3.0);
    }

    #[test]
    fn test_reduce_of_empty_map_fails() {
        let err = reduce()
            .call(vec![Value::new(PythonNodeMap::new()), binary_op(f64::max)])
            .expect_err("empty");
        assert!(err.to_string().contains("empty node map"));
    }

    #[test]
    fn test_equality_tolerates_rounding() {
        let a: PythonNodeMap = BTreeMap::from([(0, 0.1 + 0.2)]);
        let b: PythonNodeMap = BTreeMap::from([(0, 0.3)]);
        assert!(maps_equal(&a, &b));
        assert!(!maps_equal(&a, &BTreeMap::from([(1, 0.3)])));
    }
}

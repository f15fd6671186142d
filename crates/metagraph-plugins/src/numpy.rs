//! Dense node maps and vectors.

use metagraph_core::{ConcreteType, KernelError, Translator, Value, WrapperError};

use crate::catalog::approx_eq;
use crate::python::PythonNodeMap;

/// Dense node map.
///
/// Node ids are positions unless `node_ids` is set. A `mask` marks which
/// positions hold a value.
#[derive(Debug, Clone, PartialEq)]
pub struct NumpyNodeMap {
    values: Vec<f64>,
    mask: Option<Vec<bool>>,
    node_ids: Option<Vec<u64>>,
}

impl NumpyNodeMap {
    /// Node `i` has value `values[i]`.
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            mask: None,
            node_ids: None,
        }
    }

    pub fn with_mask(values: Vec<f64>, mask: Vec<bool>) -> Result<Self, WrapperError> {
        if values.len() != mask.len() {
            return Err(WrapperError::new(format!(
                "mask length {} does not match {} values",
                mask.len(),
                values.len()
            )));
        }
        Ok(Self {
            values,
            mask: Some(mask),
            node_ids: None,
        })
    }

    pub fn with_node_ids(values: Vec<f64>, node_ids: Vec<u64>) -> Result<Self, WrapperError> {
        if values.len() != node_ids.len() {
            return Err(WrapperError::new(format!(
                "{} node ids given for {} values",
                node_ids.len(),
                values.len()
            )));
        }
        if node_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(WrapperError::new("node ids must be strictly increasing"));
        }
        Ok(Self {
            values,
            mask: None,
            node_ids: Some(node_ids),
        })
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub fn node_ids(&self) -> Option<&[u64]> {
        self.node_ids.as_deref()
    }

    /// Length of the underlying dense array
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Present (node, value) pairs in node order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (u64, f64)> + '_> {
        match (&self.mask, &self.node_ids) {
            (_, Some(ids)) => Box::new(ids.iter().copied().zip(self.values.iter().copied())),
            (Some(mask), None) => Box::new(
                self.values
                    .iter()
                    .zip(mask)
                    .enumerate()
                    .filter(|(_, (_, present))| **present)
                    .map(|(pos, (value, _))| (pos as u64, *value)),
            ),
            (None, None) => Box::new(
                self.values
                    .iter()
                    .enumerate()
                    .map(|(pos, value)| (pos as u64, *value)),
            ),
        }
    }

    pub fn get(&self, node: u64) -> Option<f64> {
        self.iter().find(|(id, _)| *id == node).map(|(_, v)| v)
    }

    pub fn to_python(&self) -> PythonNodeMap {
        self.iter().collect()
    }
}

fn same_entries(a: &NumpyNodeMap, b: &NumpyNodeMap) -> bool {
    let mut left = a.iter();
    let mut right = b.iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some((ka, va)), Some((kb, vb))) if ka == kb && approx_eq(va, vb) => {}
            _ => return false,
        }
    }
}

pub fn node_map_type() -> ConcreteType {
    ConcreteType::wrapper::<NumpyNodeMap>("NumpyNodeMap", "NodeMap").with_equality(|a, b| {
        match (a.downcast_ref::<NumpyNodeMap>(), b.downcast_ref::<NumpyNodeMap>()) {
            (Some(a), Some(b)) => same_entries(a, b),
            _ => false,
        }
    })
}

/// Dense vector, `Vec<f64>`.
pub fn vector_type() -> ConcreteType {
    ConcreteType::new::<Vec<f64>>("NumpyVectorType", "Vector").with_equality(|a, b| {
        match (a.downcast_ref::<Vec<f64>>(), b.downcast_ref::<Vec<f64>>()) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y))
            }
            _ => false,
        }
    })
}

/// Longest masked array built from sparse ids; wider id ranges keep explicit ids.
pub const MAX_MASKED_LEN: usize = 1 << 24;

/// Array length needed to address node `max_id`.
pub(crate) fn dense_len(max_id: u64) -> Result<usize, KernelError> {
    usize::try_from(max_id)
        .ok()
        .and_then(|max| max.checked_add(1))
        .ok_or_else(|| KernelError::failed(format!("node id {} is out of range", max_id)))
}

/// Sequential ids `0..n` become a plain dense array, other ids a mask, and
/// ids too far apart for a mask an explicit id list.
pub fn python_to_numpy() -> Translator {
    Translator::new("python_to_numpy", "PythonNodeMapType", "NumpyNodeMap", |value| {
        let map = value.cast::<PythonNodeMap>()?;
        let sequential = map.keys().enumerate().all(|(pos, id)| pos as u64 == *id);
        if sequential {
            return Ok(Value::new(NumpyNodeMap::new(map.values().copied().collect())));
        }

        let size = match map.keys().next_back().map(|max| dense_len(*max)) {
            Some(Ok(size)) if size <= MAX_MASKED_LEN => size,
            _ => {
                let (ids, values) = map.iter().map(|(id, v)| (*id, *v)).unzip();
                return Ok(Value::new(NumpyNodeMap::with_node_ids(values, ids)?));
            }
        };
        let mut values = vec![0.0; size];
        let mut mask = vec![false; size];
        for (&id, &v) in map {
            let pos = usize::try_from(id).map_err(|err| KernelError::failed(err.to_string()))?;
            values[pos] = v;
            mask[pos] = true;
        }
        Ok(Value::new(NumpyNodeMap::with_mask(values, mask)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sparse_ids_use_a_mask() {
        let map: PythonNodeMap = BTreeMap::from([(0, 12.5), (1, 33.4), (42, -1.2)]);
        let out = python_to_numpy().call(Value::new(map.clone())).expect("translate");
        let nodes = out.cast::<NumpyNodeMap>().expect("numpy");
        assert_eq!(nodes.capacity(), 43);
        assert!(nodes.mask().is_some());
        assert_eq!(nodes.get(42), Some(-1.2));
        assert_eq!(nodes.get(2), None);
        assert_eq!(nodes.to_python(), map);
    }

    #[test]
    fn test_sequential_ids_stay_dense() {
        let map: PythonNodeMap = BTreeMap::from([(0, 1.0), (1, 2.0), (2, 3.0)]);
        let out = python_to_numpy().call(Value::new(map)).expect("translate");
        let nodes = out.cast::<NumpyNodeMap>().expect("numpy");
        assert!(nodes.mask().is_none());
        assert_eq!(nodes.capacity(), 3);
    }

    #[test]
    fn test_far_apart_ids_keep_explicit_ids() {
        let map: PythonNodeMap = BTreeMap::from([(0, 1.0), (1 << 40, 3.0), (u64::MAX, 2.0)]);
        let out = python_to_numpy().call(Value::new(map.clone())).expect("translate");
        let nodes = out.cast::<NumpyNodeMap>().expect("numpy");
        assert_eq!(nodes.node_ids(), Some(&[0, 1 << 40, u64::MAX][..]));
        assert!(nodes.mask().is_none());
        assert_eq!(nodes.get(u64::MAX), Some(2.0));
        assert_eq!(nodes.to_python(), map);
    }

    #[test]
    fn test_dense_len_rejects_unaddressable_ids() {
        assert_eq!(dense_len(42).expect("len"), 43);
        assert!(dense_len(u64::MAX).is_err());
    }

    #[test]
    fn test_constructors_validate_lengths() {
        assert!(NumpyNodeMap::with_mask(vec![1.0], vec![true, false]).is_err());
        assert!(NumpyNodeMap::with_node_ids(vec![1.0, 2.0], vec![3, 3]).is_err());
        let nodes = NumpyNodeMap::with_node_ids(vec![1.0, 2.0], vec![3, 7]).expect("ids");
        assert_eq!(nodes.get(7), Some(2.0));
    }
}

//! Sparse node maps.

use metagraph_core::{ConcreteType, KernelError, Translator, Value, WrapperError};

use crate::catalog::approx_eq;
use crate::numpy::{dense_len, NumpyNodeMap};
use crate::python::PythonNodeMap;

/// Sparse vector of node values with a fixed size.
#[derive(Debug, Clone, PartialEq)]
pub struct GrblasNodeMap {
    size: usize,
    indices: Vec<u64>,
    values: Vec<f64>,
}

impl GrblasNodeMap {
    /// Build from parallel index/value lists; indices are sorted on the way in.
    pub fn from_values(
        indices: Vec<u64>,
        values: Vec<f64>,
        size: usize,
    ) -> Result<Self, WrapperError> {
        if indices.len() != values.len() {
            return Err(WrapperError::new(format!(
                "{} indices given for {} values",
                indices.len(),
                values.len()
            )));
        }
        let mut entries: Vec<(u64, f64)> = indices.into_iter().zip(values).collect();
        entries.sort_by_key(|(idx, _)| *idx);
        let out_of_range = |idx: u64| usize::try_from(idx).map_or(true, |idx| idx >= size);
        if let Some((idx, _)) = entries.iter().find(|(idx, _)| out_of_range(*idx)) {
            return Err(WrapperError::new(format!(
                "index {} out of range for size {}",
                idx, size
            )));
        }
        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(WrapperError::new("duplicate index"));
        }
        let (indices, values) = entries.into_iter().unzip();
        Ok(Self {
            size,
            indices,
            values,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries
    pub fn nvals(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn get(&self, index: u64) -> Option<f64> {
        self.indices
            .binary_search(&index)
            .ok()
            .map(|pos| self.values[pos])
    }
}

fn vectors_equal(a: &GrblasNodeMap, b: &GrblasNodeMap) -> bool {
    a.size == b.size
        && a.indices == b.indices
        && a.values
            .iter()
            .zip(&b.values)
            .all(|(x, y)| approx_eq(*x, *y))
}

pub fn node_map_type() -> ConcreteType {
    ConcreteType::wrapper::<GrblasNodeMap>("GrblasNodeMap", "NodeMap")
        .with_equality(|a, b| {
            match (a.downcast_ref::<GrblasNodeMap>(), b.downcast_ref::<GrblasNodeMap>()) {
                (Some(a), Some(b)) => vectors_equal(a, b),
                _ => false,
            }
        })
        .with_constructor(|args| {
            let indices = args
                .first()
                .ok_or(KernelError::MissingArgument(0))?
                .cast::<Vec<u64>>()?
                .clone();
            let values = args
                .get(1)
                .ok_or(KernelError::MissingArgument(1))?
                .cast::<Vec<f64>>()?
                .clone();
            let size = match args.get(2) {
                Some(size) => *size.cast::<usize>()?,
                None => indices.iter().max().map_or(Ok(0), |max| dense_len(*max))?,
            };
            Ok(Value::new(GrblasNodeMap::from_values(indices, values, size)?))
        })
}

/// The dense array length becomes the vector size.
pub fn numpy_to_grblas() -> Translator {
    Translator::new("numpy_to_grblas", "NumpyNodeMap", "GrblasNodeMap", |value| {
        let nodes = value.cast::<NumpyNodeMap>()?;
        let size = match nodes.node_ids() {
            Some(ids) => ids.last().map_or(Ok(0), |max| dense_len(*max))?,
            None => nodes.capacity(),
        };
        let (indices, values) = nodes.iter().unzip();
        Ok(Value::new(GrblasNodeMap::from_values(indices, values, size)?))
    })
}

pub fn grblas_to_python() -> Translator {
    Translator::new("grblas_to_python", "GrblasNodeMap", "PythonNodeMapType", |value| {
        let vector = value.cast::<GrblasNodeMap>()?;
        Ok(Value::new(vector.iter().collect::<PythonNodeMap>()))
    })
}

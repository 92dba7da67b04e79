//! Opaque bundle of named tensors standing in for an already-converted submodule

use candle_core::Tensor;
use std::collections::BTreeMap;

use crate::core::error::{ConvertError, Result};
use crate::core::traits::StateDict;

/// Named tensors of one submodule, keyed relative to the submodule root
#[derive(Debug, Clone)]
pub struct ParameterGroup {
    name: String,
    tensors: BTreeMap<String, Tensor>,
}

impl ParameterGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: BTreeMap::new(),
        }
    }

    /// Group built from `(relative name, tensor)` pairs
    pub fn from_tensors<I, S>(name: impl Into<String>, tensors: I) -> Self
    where
        I: IntoIterator<Item = (S, Tensor)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            tensors: tensors.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(key.into(), tensor);
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.tensors.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.tensors.iter()
    }
}

impl StateDict for ParameterGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.tensors
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: Tensor) -> Result<bool> {
        let Some(slot) = self.tensors.get_mut(name) else {
            return Ok(false);
        };
        if slot.dims() != value.dims() {
            return Err(ConvertError::model_load(
                self.name.clone(),
                format!(
                    "shape mismatch for {}: expected {:?}, got {:?}",
                    name,
                    slot.dims(),
                    value.dims()
                ),
            ));
        }
        *slot = value;
        Ok(true)
    }

    fn parameter(&self, name: &str) -> Option<Tensor> {
        self.tensors.get(name).cloned()
    }
}

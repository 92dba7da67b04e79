//! Assign a validated mapping onto a module's parameters

use std::collections::BTreeSet;

use super::checkpoint::ParameterMapping;
use crate::core::error::{ConvertError, MismatchKind, Result};
use crate::core::traits::StateDict;

/// Outcome of a state-dict load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters overwritten from the mapping
    pub loaded: usize,
    /// Declared by the module, absent from the mapping; left at their initial value
    pub missing: Vec<String>,
    /// In the mapping, not declared by the module; discarded
    pub unexpected: Vec<String>,
    /// Module size after loading, embeddings excluded
    pub num_parameters: usize,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Load `state_dict` into `module`
///
/// Shapes are checked for every matching key before anything is written,
/// so a shape mismatch leaves the module untouched. With `strict` unset,
/// missing and unexpected keys are reported and logged rather than fatal.
pub fn load_state_dict<M: StateDict + ?Sized>(
    module: &mut M,
    state_dict: ParameterMapping,
    strict: bool,
) -> Result<LoadReport> {
    let current = module.named_parameters();
    let declared: BTreeSet<&str> = current.iter().map(|(k, _)| k.as_str()).collect();

    let mut missing: Vec<String> = declared
        .iter()
        .filter(|k| !state_dict.contains_key(**k))
        .map(|k| k.to_string())
        .collect();
    let mut unexpected: Vec<String> = state_dict
        .keys()
        .filter(|k| !declared.contains(k.as_str()))
        .cloned()
        .collect();
    missing.sort();
    unexpected.sort();

    if strict {
        if !unexpected.is_empty() {
            return Err(ConvertError::validation(
                MismatchKind::ExtraKeys,
                unexpected.into_iter().collect(),
            ));
        }
        if !missing.is_empty() {
            return Err(ConvertError::validation(
                MismatchKind::MissingKeys,
                missing.into_iter().collect(),
            ));
        }
    }

    for (name, tensor) in &current {
        if let Some(value) = state_dict.get(name) {
            if value.dims() != tensor.dims() {
                return Err(ConvertError::model_load(
                    module.name(),
                    format!(
                        "size mismatch for {}: checkpoint {:?}, module {:?}",
                        name,
                        value.dims(),
                        tensor.dims()
                    ),
                ));
            }
        }
    }

    let mut loaded = 0usize;
    for (name, value) in state_dict {
        if module.set_parameter(&name, value)? {
            loaded += 1;
        }
    }

    for key in &missing {
        tracing::warn!("Parameter not in checkpoint, keeping initial value: {}", key);
    }
    for key in &unexpected {
        tracing::warn!("Checkpoint entry not used by {}: {}", module.name(), key);
    }

    let num_parameters = module.num_parameters(true);
    tracing::info!("model loaded: {:.1}M params", num_parameters as f64 / 1e6);

    Ok(LoadReport {
        loaded,
        missing,
        unexpected,
        num_parameters,
    })
}

//! Core traits shared by every parameter container
//!
//! The converter never runs a model forward. It only needs to enumerate,
//! read and overwrite named tensors, and to toggle weight normalization
//! on the layers that were trained with it.

use candle_core::Tensor;
use std::collections::BTreeSet;

use super::error::Result;

/// A module whose parameters are addressable by dotted path
pub trait StateDict {
    /// Component name for identification and logging
    fn name(&self) -> &str;

    /// All parameters in the module's current structural form
    fn named_parameters(&self) -> Vec<(String, Tensor)>;

    /// Overwrite one parameter in place
    ///
    /// Returns `Ok(false)` when the module does not declare `name`, and an
    /// error when it does but the shapes disagree.
    fn set_parameter(&mut self, name: &str, value: Tensor) -> Result<bool>;

    /// Parameter names, computed fresh from the current structure
    fn state_dict_keys(&self) -> BTreeSet<String> {
        self.named_parameters().into_iter().map(|(k, _)| k).collect()
    }

    /// Look up one parameter by name
    fn parameter(&self, name: &str) -> Option<Tensor> {
        self.named_parameters()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, t)| t)
    }

    /// Total element count, optionally skipping embedding tables
    fn num_parameters(&self, exclude_embeddings: bool) -> usize {
        self.named_parameters()
            .iter()
            .filter(|(k, _)| !(exclude_embeddings && is_embedding_key(k)))
            .map(|(_, t)| t.elem_count())
            .sum()
    }
}

/// Modules that store some weights in magnitude/direction form while loading
pub trait Reparameterize {
    /// Replace designated weights with `weight_g`/`weight_v` pairs
    fn apply_weight_norm(&mut self) -> Result<()>;

    /// Fold `weight_g`/`weight_v` back into `weight`; no-op when not applied
    fn remove_weight_norm(&mut self) -> Result<()>;

    /// Whether any designated layer is currently decomposed
    fn is_weight_normed(&self) -> bool;
}

/// True when some path segment names an embedding table
pub fn is_embedding_key(key: &str) -> bool {
    key.split('.').any(|segment| segment.starts_with("embed"))
}

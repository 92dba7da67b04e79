//! Parameter key renaming
//!
//! A rename table is an ordered list of `(old, new)` substring rules.
//! Every rule is applied to every key in table order, so rules chain.
//! Two source keys that end up with the same name are rejected instead of
//! silently overwriting each other.

use std::collections::HashMap;

use super::checkpoint::ParameterMapping;
use crate::core::error::{ConvertError, Result};

/// Ordered substring rename rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameTable {
    rules: Vec<(String, String)>,
}

impl RenameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules mapping original VITS discriminator names to the transformers layout
    pub fn discriminator() -> Self {
        Self::new().with_rule("conv_post", "final_conv")
    }

    /// Append a rule
    pub fn with_rule(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.rules.push((old.into(), new.into()));
        self
    }

    pub fn rules(&self) -> &[(String, String)] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rename a single key
    pub fn rename_key(&self, key: &str) -> String {
        self.rules
            .iter()
            .fold(key.to_string(), |acc, (old, new)| {
                if acc.contains(old.as_str()) {
                    acc.replace(old.as_str(), new)
                } else {
                    acc
                }
            })
    }

    /// Rename every key of a mapping, consuming it
    pub fn apply(&self, source: ParameterMapping) -> Result<ParameterMapping> {
        let mut renamed = ParameterMapping::with_capacity(source.len());
        let mut origin: HashMap<String, String> = HashMap::with_capacity(source.len());
        let mut changed = 0usize;

        for (key, tensor) in source {
            let new_key = self.rename_key(&key);
            if new_key != key {
                tracing::debug!("Renamed {} -> {}", key, new_key);
                changed += 1;
            }
            if let Some(previous) = origin.get(&new_key) {
                let (first, second) = if previous.as_str() <= key.as_str() {
                    (previous.clone(), key)
                } else {
                    (key, previous.clone())
                };
                return Err(ConvertError::KeyCollision {
                    renamed: new_key,
                    first,
                    second,
                });
            }
            origin.insert(new_key.clone(), key);
            renamed.insert(new_key, tensor);
        }

        tracing::info!("Renamed {} of {} keys", changed, renamed.len());
        Ok(renamed)
    }
}

impl<O, N> FromIterator<(O, N)> for RenameTable
where
    O: Into<String>,
    N: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (O, N)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().map(|(o, n)| (o.into(), n.into())).collect(),
        }
    }
}

//! Key-set validation between a renamed checkpoint and its destination module
//!
//! Nothing is written into the destination until both directions of the
//! comparison come back empty (after ignore-pattern filtering).

use std::collections::BTreeSet;

use super::checkpoint::ParameterMapping;
use crate::core::error::{ConvertError, MismatchKind, Result};

/// Suffix of attention bias buffers that differ between the two layouts
pub const ATTENTION_BIAS_SUFFIX: &str = ".attn.bias";

/// Key suffixes exempt from the extra/missing checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePatterns {
    suffixes: Vec<String>,
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        Self {
            suffixes: vec![ATTENTION_BIAS_SUFFIX.to_string()],
        }
    }
}

impl IgnorePatterns {
    /// No exemptions at all
    pub fn none() -> Self {
        Self {
            suffixes: Vec::new(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    pub fn matches(&self, key: &str) -> bool {
        self.suffixes.iter().any(|s| key.ends_with(s.as_str()))
    }
}

/// Set difference in both directions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDiff {
    /// In the checkpoint, not declared by the module
    pub extra: BTreeSet<String>,
    /// Declared by the module, absent from the checkpoint
    pub missing: BTreeSet<String>,
}

impl KeyDiff {
    /// Compare `provided` against `expected`, dropping ignored keys
    pub fn compute<'a, I>(provided: I, expected: &BTreeSet<String>, ignore: &IgnorePatterns) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let provided: BTreeSet<&String> = provided.into_iter().collect();

        let extra = provided
            .iter()
            .filter(|k| !expected.contains(k.as_str()) && !ignore.matches(k))
            .map(|k| (*k).clone())
            .collect();
        let missing = expected
            .iter()
            .filter(|k| !provided.contains(k) && !ignore.matches(k))
            .cloned()
            .collect();

        Self { extra, missing }
    }

    pub fn is_clean(&self) -> bool {
        self.extra.is_empty() && self.missing.is_empty()
    }

    /// Fail on extra keys first, then on missing keys
    pub fn into_result(self) -> Result<()> {
        if !self.extra.is_empty() {
            return Err(ConvertError::validation(MismatchKind::ExtraKeys, self.extra));
        }
        if !self.missing.is_empty() {
            return Err(ConvertError::validation(MismatchKind::MissingKeys, self.missing));
        }
        Ok(())
    }
}

/// Gate a load: error unless the renamed mapping matches the expected key set
pub fn validate(
    renamed: &ParameterMapping,
    expected: &BTreeSet<String>,
    ignore: &IgnorePatterns,
) -> Result<()> {
    let diff = KeyDiff::compute(renamed.keys(), expected, ignore);
    if !diff.is_clean() {
        tracing::debug!(
            "Key mismatch: {} extra, {} missing",
            diff.extra.len(),
            diff.missing.len()
        );
    }
    diff.into_result()?;
    tracing::info!("Validated {} keys against destination", expected.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_exact_match_is_clean() {
        let keys = set(&["a.weight", "b.weight"]);
        let diff = KeyDiff::compute(keys.iter(), &keys, &IgnorePatterns::default());
        assert!(diff.is_clean());
        assert!(diff.into_result().is_ok());
    }

    #[test]
    fn test_missing_key_named() {
        let provided = set(&["a.weight"]);
        let expected = set(&["a.weight", "b.weight"]);
        let err = KeyDiff::compute(provided.iter(), &expected, &IgnorePatterns::default())
            .into_result()
            .unwrap_err();
        let (kind, keys) = err.mismatched_keys().unwrap();
        assert_eq!(kind, MismatchKind::MissingKeys);
        assert_eq!(keys, &set(&["b.weight"]));
    }

    #[test]
    fn test_extra_key_named() {
        let provided = set(&["a.weight", "z.weight"]);
        let expected = set(&["a.weight"]);
        let err = KeyDiff::compute(provided.iter(), &expected, &IgnorePatterns::default())
            .into_result()
            .unwrap_err();
        let (kind, keys) = err.mismatched_keys().unwrap();
        assert_eq!(kind, MismatchKind::ExtraKeys);
        assert_eq!(keys, &set(&["z.weight"]));
    }

    #[test]
    fn test_extra_reported_before_missing() {
        let provided = set(&["z.weight"]);
        let expected = set(&["a.weight"]);
        let err = KeyDiff::compute(provided.iter(), &expected, &IgnorePatterns::default())
            .into_result()
            .unwrap_err();
        assert_eq!(err.mismatched_keys().unwrap().0, MismatchKind::ExtraKeys);
    }

    #[test]
    fn test_ignored_suffix_on_either_side() {
        let ignore = IgnorePatterns::default();
        let expected = set(&["a.weight", "layers.0.attn.bias"]);
        let provided = set(&["a.weight"]);
        assert!(KeyDiff::compute(provided.iter(), &expected, &ignore).is_clean());

        let expected = set(&["a.weight"]);
        let provided = set(&["a.weight", "layers.3.attn.bias"]);
        assert!(KeyDiff::compute(provided.iter(), &expected, &ignore).is_clean());
    }

    #[test]
    fn test_no_ignore_patterns_reports_attention_bias() {
        let expected = set(&["a.weight", "layers.0.attn.bias"]);
        let provided = set(&["a.weight"]);
        let diff = KeyDiff::compute(provided.iter(), &expected, &IgnorePatterns::none());
        assert_eq!(diff.missing, set(&["layers.0.attn.bias"]));
    }
}

//! Tokenizer files carried from the generator directory into the output
//!
//! The VITS tokenizer is character-level and fully described by its JSON
//! files, so exporting it is a checked copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::error::{ConvertError, Result};

/// Character vocabulary, required
pub const VOCAB_FILE: &str = "vocab.json";

/// Tokenizer files copied only when the generator directory has them
pub const OPTIONAL_TOKENIZER_FILES: [&str; 3] = [
    "tokenizer_config.json",
    "special_tokens_map.json",
    "added_tokens.json",
];

fn io_error(e: std::io::Error, path: &Path) -> ConvertError {
    ConvertError::Io {
        message: e.to_string(),
        path: Some(path.to_path_buf()),
    }
}

/// Read `vocab.json` as a token -> id map
pub fn load_vocab<P: AsRef<Path>>(model_dir: P) -> Result<HashMap<String, i64>> {
    let path = model_dir.as_ref().join(VOCAB_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| io_error(e, &path))?;
    serde_json::from_str(&content).map_err(|e| ConvertError::Config {
        message: format!("invalid vocabulary: {}", e),
        path: Some(path),
    })
}

/// Copy the tokenizer files of `source_dir` into `output_dir`
///
/// Fails when `vocab.json` is absent or unreadable. Returns the written paths.
pub fn copy_tokenizer_files<P: AsRef<Path>, Q: AsRef<Path>>(
    source_dir: P,
    output_dir: Q,
) -> Result<Vec<PathBuf>> {
    let source_dir = source_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let vocab = load_vocab(source_dir)?;
    tracing::debug!("Tokenizer vocabulary has {} entries", vocab.len());

    let mut written = Vec::new();
    for name in std::iter::once(VOCAB_FILE).chain(OPTIONAL_TOKENIZER_FILES) {
        let from = source_dir.join(name);
        if !from.exists() {
            tracing::debug!("Skipping absent tokenizer file {}", name);
            continue;
        }
        let to = output_dir.join(name);
        std::fs::copy(&from, &to).map_err(|e| io_error(e, &from))?;
        written.push(to);
    }

    tracing::info!("Saved {} tokenizer files to {:?}", written.len(), output_dir);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copies_present_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join(VOCAB_FILE), r#"{"a": 0, "b": 1}"#).unwrap();
        std::fs::write(src.path().join("tokenizer_config.json"), "{}").unwrap();

        let written = copy_tokenizer_files(src.path(), dst.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dst.path().join(VOCAB_FILE).exists());
        assert!(dst.path().join("tokenizer_config.json").exists());
        assert!(!dst.path().join("added_tokens.json").exists());
    }

    #[test]
    fn test_missing_vocab_is_an_error() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        assert!(copy_tokenizer_files(src.path(), dst.path()).is_err());
    }

    #[test]
    fn test_invalid_vocab_rejected() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join(VOCAB_FILE), "not json").unwrap();
        let err = load_vocab(src.path()).unwrap_err();
        assert!(matches!(err, ConvertError::Config { .. }));
    }
}

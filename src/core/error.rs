//! Structured error handling for checkpoint conversion
//!
//! Provides a single error enum covering key validation, checkpoint
//! reading, configuration and artifact resolution, with messages that
//! name exactly which parameters are involved.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias with ConvertError
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Which side of a key-set comparison failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Checkpoint holds names the destination module does not declare
    ExtraKeys,
    /// Destination module declares names the checkpoint does not hold
    MissingKeys,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::ExtraKeys => write!(f, "extra keys found"),
            MismatchKind::MissingKeys => write!(f, "missing keys"),
        }
    }
}

/// Main error type for the converter
#[derive(Error, Debug, Clone)]
pub enum ConvertError {
    /// Renamed checkpoint and destination module disagree on key names
    #[error("{kind}: {}", format_keys(.keys))]
    Validation {
        kind: MismatchKind,
        keys: BTreeSet<String>,
    },

    /// Two source keys rename to the same destination key
    #[error("rename collision: {renamed:?} produced by both {first:?} and {second:?}")]
    KeyCollision {
        renamed: String,
        first: String,
        second: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Module construction or parameter assignment errors
    #[error("Model loading error in {component}: {message}")]
    ModelLoad {
        message: String,
        component: String,
    },

    /// Checkpoint file could not be read
    #[error("Checkpoint error ({path:?}): {message}")]
    Checkpoint { message: String, path: PathBuf },

    /// Remote artifact could not be fetched or published
    #[error("Resolution error for {location}: {message}")]
    Resolution { message: String, location: String },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Internal/bug errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_keys(keys: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{}'", k)).collect();
    format!("{{{}}}", quoted.join(", "))
}

impl ConvertError {
    /// Build a validation error for the given side
    pub fn validation(kind: MismatchKind, keys: BTreeSet<String>) -> Self {
        ConvertError::Validation { kind, keys }
    }

    /// Build a model loading error for a component
    pub fn model_load(component: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::ModelLoad {
            message: message.into(),
            component: component.into(),
        }
    }

    /// Offending keys for validation errors, empty otherwise
    pub fn mismatched_keys(&self) -> Option<(MismatchKind, &BTreeSet<String>)> {
        match self {
            ConvertError::Validation { kind, keys } => Some((*kind, keys)),
            _ => None,
        }
    }
}

/// Extension trait for adding context to foreign errors
pub trait ResultExt<T> {
    /// Add a simple message context
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add lazily built context
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| ConvertError::Internal {
            message: format!("{}: {}", msg.into(), e),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ConvertError::Internal {
            message: format!("{}: {}", f(), e),
        })
    }
}

impl From<anyhow::Error> for ConvertError {
    fn from(err: anyhow::Error) -> Self {
        ConvertError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<candle_core::Error> for ConvertError {
    fn from(err: candle_core::Error) -> Self {
        ConvertError::Internal {
            message: format!("Tensor operation failed: {}", err),
        }
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Config {
            message: err.to_string(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_keys() {
        let keys: BTreeSet<String> = ["b.weight", "a.bias"].iter().map(|s| s.to_string()).collect();
        let err = ConvertError::validation(MismatchKind::MissingKeys, keys);
        assert_eq!(err.to_string(), "missing keys: {'a.bias', 'b.weight'}");
    }

    #[test]
    fn test_extra_keys_display() {
        let keys: BTreeSet<String> = std::iter::once("x.weight".to_string()).collect();
        let err = ConvertError::validation(MismatchKind::ExtraKeys, keys);
        assert!(err.to_string().starts_with("extra keys found"));
        let (kind, keys) = err.mismatched_keys().unwrap();
        assert_eq!(kind, MismatchKind::ExtraKeys);
        assert!(keys.contains("x.weight"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ConvertError = io.into();
        assert!(err.to_string().contains("I/O error"));
    }
}

//! Checkpoint readers
//!
//! Reads a flat name -> tensor mapping from either a PyTorch pickle
//! (`.pth`, `.pt`, `.bin`, optionally nested under a top-level key such as
//! `"model"`) or a safetensors file.

use candle_core::{pickle, safetensors, Device, Tensor};
use std::collections::HashMap;
use std::path::Path;

use crate::core::error::{ConvertError, Result};

/// Parameter name -> tensor, as read from or written to storage
pub type ParameterMapping = HashMap<String, Tensor>;

/// Top-level entry holding the state dict in original VITS training checkpoints
pub const DEFAULT_CHECKPOINT_KEY: &str = "model";

/// On-disk checkpoint encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    Pickle,
    Safetensors,
}

impl CheckpointFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("safetensors") => Self::Safetensors,
            _ => Self::Pickle,
        }
    }
}

/// Read every tensor of a checkpoint
///
/// `key` selects the nested state dict inside a pickle; it is ignored for
/// safetensors files, which are always flat.
pub fn read_checkpoint<P: AsRef<Path>>(
    path: P,
    key: Option<&str>,
    device: &Device,
) -> Result<ParameterMapping> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConvertError::Checkpoint {
            message: "file not found".to_string(),
            path: path.to_path_buf(),
        });
    }

    let format = CheckpointFormat::from_path(path);
    tracing::info!("Loading checkpoint from {:?} ({:?})", path, format);

    let checkpoint_error = |e: candle_core::Error| ConvertError::Checkpoint {
        message: e.to_string(),
        path: path.to_path_buf(),
    };

    let tensors: ParameterMapping = match format {
        CheckpointFormat::Safetensors => safetensors::load(path, device).map_err(checkpoint_error)?,
        CheckpointFormat::Pickle => pickle::read_all_with_key(path, key)
            .map_err(checkpoint_error)?
            .into_iter()
            .map(|(name, tensor)| -> Result<(String, Tensor)> {
                Ok((name, tensor.to_device(device)?))
            })
            .collect::<Result<_>>()?,
    };

    if tensors.is_empty() {
        return Err(ConvertError::Checkpoint {
            message: match key {
                Some(k) if format == CheckpointFormat::Pickle => {
                    format!("no tensors found under key {:?}", k)
                }
                _ => "no tensors found".to_string(),
            },
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Loaded {} tensors", tensors.len());
    Ok(tensors)
}

//! Feature extractor description written next to the converted model
//!
//! The converter does not extract features. It only emits the
//! `preprocessor_config.json` a VITS training pipeline expects to find.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::error::{ConvertError, Result, ResultExt};

/// File name of the feature extractor config inside a model directory
pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

/// Serialized settings of a `VitsFeatureExtractor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractorConfig {
    pub feature_extractor_type: String,
    /// Number of mel bins
    pub feature_size: usize,
    pub sampling_rate: u32,
    pub padding_value: f32,
    pub hop_length: usize,
    pub n_fft: usize,
    pub max_wav_value: f32,
    pub return_attention_mask: bool,
}

impl FeatureExtractorConfig {
    /// Settings for a model sampled at `sampling_rate` with `feature_size` mel bins
    pub fn new(sampling_rate: u32, feature_size: usize) -> Self {
        Self {
            feature_extractor_type: "VitsFeatureExtractor".to_string(),
            feature_size,
            sampling_rate,
            padding_value: 0.0,
            hop_length: 256,
            n_fft: 1024,
            max_wav_value: 32768.0,
            return_attention_mask: false,
        }
    }

    /// Write `preprocessor_config.json` into a model directory
    pub fn save_pretrained<P: AsRef<Path>>(&self, model_dir: P) -> Result<PathBuf> {
        let path = model_dir.as_ref().join(PREPROCESSOR_CONFIG_FILE);
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize feature extractor config")?;
        std::fs::write(&path, content).map_err(|e| ConvertError::Io {
            message: e.to_string(),
            path: Some(path.clone()),
        })?;
        Ok(path)
    }
}

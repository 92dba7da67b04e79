//! VITS configuration matching the transformers `config.json` structure
//!
//! Only the fields the converter reads are typed. Everything else the
//! generator declared is kept in `extra` and written back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::core::error::{ConvertError, Result, ResultExt};

/// File name of the configuration inside a model directory
pub const CONFIG_FILE: &str = "config.json";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitsConfig {
    /// Model type tag
    #[serde(default = "default_model_type")]
    pub model_type: String,

    /// Number of speakers; a speaker embedding exists only when > 1
    #[serde(default = "default_num_speakers")]
    pub num_speakers: usize,

    /// Audio sampling rate in Hz
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,

    /// Kernel size of the period discriminator convolutions
    #[serde(default = "default_discriminator_kernel_size")]
    pub discriminator_kernel_size: usize,

    /// Stride of the period discriminator convolutions
    #[serde(default = "default_discriminator_stride")]
    pub discriminator_stride: usize,

    /// One period discriminator per entry
    #[serde(default = "default_discriminator_periods")]
    pub discriminator_periods: Vec<usize>,

    /// Channel progression of each period discriminator
    #[serde(default = "default_discriminator_period_channels")]
    pub discriminator_period_channels: Vec<usize>,

    /// Channel progression of the scale discriminator
    #[serde(default = "default_discriminator_scale_channels")]
    pub discriminator_scale_channels: Vec<usize>,

    /// Negative slope of the discriminator activations
    #[serde(default = "default_leaky_relu_slope")]
    pub leaky_relu_slope: f64,

    /// Untyped fields carried through from the source config
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_model_type() -> String {
    "vits".to_string()
}

fn default_num_speakers() -> usize {
    1
}

fn default_sampling_rate() -> u32 {
    16_000
}

fn default_discriminator_kernel_size() -> usize {
    5
}

fn default_discriminator_stride() -> usize {
    3
}

fn default_discriminator_periods() -> Vec<usize> {
    vec![2, 3, 5, 7, 11]
}

fn default_discriminator_period_channels() -> Vec<usize> {
    vec![1, 32, 128, 512, 1024]
}

fn default_discriminator_scale_channels() -> Vec<usize> {
    vec![1, 16, 64, 256, 1024]
}

fn default_leaky_relu_slope() -> f64 {
    0.1
}

impl Default for VitsConfig {
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            num_speakers: default_num_speakers(),
            sampling_rate: default_sampling_rate(),
            discriminator_kernel_size: default_discriminator_kernel_size(),
            discriminator_stride: default_discriminator_stride(),
            discriminator_periods: default_discriminator_periods(),
            discriminator_period_channels: default_discriminator_period_channels(),
            discriminator_scale_channels: default_discriminator_scale_channels(),
            leaky_relu_slope: default_leaky_relu_slope(),
            extra: Map::new(),
        }
    }
}

impl VitsConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::Config {
            message: format!("Failed to read config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| ConvertError::Config {
            message: format!("Failed to parse config JSON: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        config.validate().map_err(|e| match e {
            ConvertError::Config { message, .. } => ConvertError::Config {
                message,
                path: Some(path.to_path_buf()),
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Load `config.json` from a model directory
    pub fn from_pretrained<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        Self::load(model_dir.as_ref().join(CONFIG_FILE))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .with_context(|| format!("Failed to serialize config for {:?}", path))?;
        std::fs::write(path, content).map_err(|e| ConvertError::Io {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Write `config.json` into a model directory, returning its path
    pub fn save_pretrained<P: AsRef<Path>>(&self, model_dir: P) -> Result<PathBuf> {
        let path = model_dir.as_ref().join(CONFIG_FILE);
        self.save(&path)?;
        Ok(path)
    }

    /// Record the architecture name the saved weights belong to
    pub fn set_architecture(&mut self, architecture: &str) {
        self.extra.insert(
            "architectures".to_string(),
            Value::Array(vec![Value::String(architecture.to_string())]),
        );
    }

    /// Whether the model carries a speaker embedding table
    pub fn is_multi_speaker(&self) -> bool {
        self.num_speakers > 1
    }

    /// Check structural fields the discriminator is built from
    pub fn validate(&self) -> Result<()> {
        if self.discriminator_scale_channels.len() < 5 {
            return Err(ConvertError::Config {
                message: format!(
                    "discriminator_scale_channels needs 5 entries, got {:?}",
                    self.discriminator_scale_channels
                ),
                path: None,
            });
        }
        if self.discriminator_period_channels.len() < 2 {
            return Err(ConvertError::Config {
                message: format!(
                    "discriminator_period_channels needs at least 2 entries, got {:?}",
                    self.discriminator_period_channels
                ),
                path: None,
            });
        }
        if self.discriminator_kernel_size == 0 || self.discriminator_stride == 0 {
            return Err(ConvertError::Config {
                message: "discriminator kernel size and stride must be positive".to_string(),
                path: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_absent() {
        let config: VitsConfig = serde_json::from_str(r#"{"model_type": "vits"}"#).unwrap();
        assert_eq!(config.num_speakers, 1);
        assert_eq!(config.sampling_rate, 16_000);
        assert_eq!(config.discriminator_periods, vec![2, 3, 5, 7, 11]);
        assert!(!config.is_multi_speaker());
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let json = r#"{
            "hidden_size": 192,
            "num_speakers": 4,
            "sampling_rate": 22050,
            "upsample_rates": [8, 8, 2, 2]
        }"#;
        let mut config: VitsConfig = serde_json::from_str(json).unwrap();
        assert!(config.is_multi_speaker());
        assert_eq!(config.extra["hidden_size"], 192);

        config.set_architecture("VitsModelForPreTraining");
        let written = serde_json::to_value(&config).unwrap();
        assert_eq!(written["upsample_rates"], serde_json::json!([8, 8, 2, 2]));
        assert_eq!(written["architectures"][0], "VitsModelForPreTraining");
        assert_eq!(written["sampling_rate"], 22050);
    }

    #[test]
    fn test_validate_rejects_short_scale_channels() {
        let config = VitsConfig {
            discriminator_scale_channels: vec![1, 16],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Combined generator + discriminator model used to resume VITS training

use candle_core::Tensor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::discriminator::VitsDiscriminator;
use super::generator::{
    DECODER, DURATION_PREDICTOR, EMBED_SPEAKER, FLOW, POSTERIOR_ENCODER, TEXT_ENCODER,
};
use super::params::ParameterGroup;
use crate::config::VitsConfig;
use crate::core::error::{ConvertError, Result};
use crate::core::traits::StateDict;

/// Architecture name recorded in the written `config.json`
pub const ARCHITECTURE: &str = "VitsModelForPreTraining";

/// File name of the written weights
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Prefix of discriminator parameters in the combined state dict
pub const DISCRIMINATOR: &str = "discriminator";

/// Generator submodules moved out of a converted generator, plus a discriminator
#[derive(Debug)]
pub struct VitsModelForPreTraining {
    pub config: VitsConfig,
    pub text_encoder: ParameterGroup,
    pub flow: ParameterGroup,
    pub decoder: ParameterGroup,
    pub duration_predictor: ParameterGroup,
    pub posterior_encoder: ParameterGroup,
    pub embed_speaker: Option<ParameterGroup>,
    pub discriminator: VitsDiscriminator,
}

impl VitsModelForPreTraining {
    fn submodules(&self) -> Vec<(&str, &dyn StateDict)> {
        let mut modules: Vec<(&str, &dyn StateDict)> = Vec::with_capacity(7);
        modules.push((TEXT_ENCODER, &self.text_encoder as &dyn StateDict));
        modules.push((FLOW, &self.flow as &dyn StateDict));
        modules.push((DECODER, &self.decoder as &dyn StateDict));
        modules.push((DURATION_PREDICTOR, &self.duration_predictor as &dyn StateDict));
        modules.push((POSTERIOR_ENCODER, &self.posterior_encoder as &dyn StateDict));
        if let Some(embed) = &self.embed_speaker {
            modules.push((EMBED_SPEAKER, embed as &dyn StateDict));
        }
        modules.push((DISCRIMINATOR, &self.discriminator as &dyn StateDict));
        modules
    }

    /// Write `model.safetensors` and `config.json` into `output_dir`
    pub fn save_pretrained<P: AsRef<Path>>(&self, output_dir: P) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir).map_err(|e| ConvertError::Io {
            message: format!("Failed to create output directory: {}", e),
            path: Some(output_dir.to_path_buf()),
        })?;

        let weights_path = output_dir.join(WEIGHTS_FILE);
        let tensors = self.named_parameters();
        let metadata: HashMap<String, String> =
            std::iter::once(("format".to_string(), "pt".to_string())).collect();

        safetensors::tensor::serialize_to_file(
            tensors.iter().map(|(name, tensor)| (name.as_str(), tensor)),
            &Some(metadata),
            &weights_path,
        )
        .map_err(|e| ConvertError::Io {
            message: format!("Failed to write weights: {}", e),
            path: Some(weights_path.clone()),
        })?;

        let mut config = self.config.clone();
        config.set_architecture(ARCHITECTURE);
        config.save_pretrained(output_dir)?;

        tracing::info!(
            "Saved {} tensors ({:.1}M params) to {:?}",
            tensors.len(),
            self.num_parameters(true) as f64 / 1e6,
            output_dir
        );
        Ok(weights_path)
    }
}

impl StateDict for VitsModelForPreTraining {
    fn name(&self) -> &str {
        ARCHITECTURE
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.submodules()
            .into_iter()
            .flat_map(|(prefix, module)| {
                module
                    .named_parameters()
                    .into_iter()
                    .map(move |(k, t)| (format!("{}.{}", prefix, k), t))
            })
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: Tensor) -> Result<bool> {
        let Some((head, rest)) = name.split_once('.') else {
            return Ok(false);
        };
        match head {
            TEXT_ENCODER => self.text_encoder.set_parameter(rest, value),
            FLOW => self.flow.set_parameter(rest, value),
            DECODER => self.decoder.set_parameter(rest, value),
            DURATION_PREDICTOR => self.duration_predictor.set_parameter(rest, value),
            POSTERIOR_ENCODER => self.posterior_encoder.set_parameter(rest, value),
            EMBED_SPEAKER => match &mut self.embed_speaker {
                Some(embed) => embed.set_parameter(rest, value),
                None => Ok(false),
            },
            DISCRIMINATOR => self.discriminator.set_parameter(rest, value),
            _ => Ok(false),
        }
    }
}

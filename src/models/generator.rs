//! Already-converted VITS generator
//!
//! The generator comes from a separate conversion path and is reused as
//! is. Its flat state dict is partitioned by first path segment into the
//! submodules the pre-training model needs.

use candle_core::Device;
use std::path::Path;

use super::params::ParameterGroup;
use crate::convert::checkpoint::{read_checkpoint, ParameterMapping};
use crate::core::error::{ConvertError, Result};
use crate::core::traits::{is_embedding_key, StateDict};

/// Weight files looked for in a generator directory, in order of preference
pub const GENERATOR_WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

pub const TEXT_ENCODER: &str = "text_encoder";
pub const FLOW: &str = "flow";
pub const DECODER: &str = "decoder";
pub const DURATION_PREDICTOR: &str = "duration_predictor";
pub const POSTERIOR_ENCODER: &str = "posterior_encoder";
pub const EMBED_SPEAKER: &str = "embed_speaker";

/// Submodules every generator must provide
pub const REQUIRED_GROUPS: [&str; 5] = [
    TEXT_ENCODER,
    FLOW,
    DECODER,
    DURATION_PREDICTOR,
    POSTERIOR_ENCODER,
];

/// Generator submodules
#[derive(Debug, Clone)]
pub struct VitsGenerator {
    pub text_encoder: ParameterGroup,
    pub flow: ParameterGroup,
    pub decoder: ParameterGroup,
    pub duration_predictor: ParameterGroup,
    pub posterior_encoder: ParameterGroup,
    /// Present only for multi-speaker models
    pub embed_speaker: Option<ParameterGroup>,
}

impl VitsGenerator {
    /// Load the generator weights from a model directory
    pub fn from_pretrained<P: AsRef<Path>>(model_dir: P, device: &Device) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let weights = GENERATOR_WEIGHT_FILES
            .iter()
            .map(|f| model_dir.join(f))
            .find(|p| p.exists())
            .ok_or_else(|| {
                ConvertError::model_load(
                    "generator",
                    format!(
                        "no weight file ({}) in {:?}",
                        GENERATOR_WEIGHT_FILES.join(", "),
                        model_dir
                    ),
                )
            })?;

        let tensors = read_checkpoint(&weights, None, device)?;
        let generator = Self::from_tensors(tensors)?;
        tracing::info!(
            "Generator loaded: {:.1}M params",
            generator.num_parameters(true) as f64 / 1e6
        );
        Ok(generator)
    }

    /// Partition a flat state dict into submodules
    pub fn from_tensors(tensors: ParameterMapping) -> Result<Self> {
        let mut groups: [ParameterGroup; 6] = [
            ParameterGroup::new(TEXT_ENCODER),
            ParameterGroup::new(FLOW),
            ParameterGroup::new(DECODER),
            ParameterGroup::new(DURATION_PREDICTOR),
            ParameterGroup::new(POSTERIOR_ENCODER),
            ParameterGroup::new(EMBED_SPEAKER),
        ];

        let mut dropped = 0usize;
        for (name, tensor) in tensors {
            let Some((head, rest)) = name.split_once('.') else {
                dropped += 1;
                continue;
            };
            match groups.iter_mut().find(|g| g.name() == head) {
                Some(group) => group.insert(rest, tensor),
                None => {
                    tracing::debug!("Ignoring generator tensor outside known submodules: {}", name);
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            tracing::warn!("Dropped {} generator tensors outside known submodules", dropped);
        }

        for group in &groups[..REQUIRED_GROUPS.len()] {
            if group.is_empty() {
                return Err(ConvertError::model_load(
                    "generator",
                    format!("submodule '{}' has no parameters", group.name()),
                ));
            }
        }

        let [text_encoder, flow, decoder, duration_predictor, posterior_encoder, embed_speaker] = groups;
        Ok(Self {
            text_encoder,
            flow,
            decoder,
            duration_predictor,
            posterior_encoder,
            embed_speaker: (!embed_speaker.is_empty()).then_some(embed_speaker),
        })
    }

    /// Submodules in state-dict order
    pub fn groups(&self) -> impl Iterator<Item = &ParameterGroup> {
        [
            &self.text_encoder,
            &self.flow,
            &self.decoder,
            &self.duration_predictor,
            &self.posterior_encoder,
        ]
        .into_iter()
        .chain(self.embed_speaker.as_ref())
    }

    /// Total element count, optionally skipping embedding tables
    pub fn num_parameters(&self, exclude_embeddings: bool) -> usize {
        self.groups()
            .flat_map(|g| {
                g.iter()
                    .map(move |(k, t)| (format!("{}.{}", g.name(), k), t.elem_count()))
            })
            .filter(|(k, _)| !(exclude_embeddings && is_embedding_key(k)))
            .map(|(_, n)| n)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Tensor};

    fn toy_generator_tensors(with_speaker: bool) -> ParameterMapping {
        let device = Device::Cpu;
        let mut tensors = ParameterMapping::new();
        for group in REQUIRED_GROUPS {
            tensors.insert(
                format!("{}.layer.weight", group),
                Tensor::ones((2, 2), DType::F32, &device).unwrap(),
            );
        }
        tensors.insert(
            "text_encoder.embed_tokens.weight".to_string(),
            Tensor::ones((5, 2), DType::F32, &device).unwrap(),
        );
        if with_speaker {
            tensors.insert(
                "embed_speaker.weight".to_string(),
                Tensor::ones((3, 4), DType::F32, &device).unwrap(),
            );
        }
        tensors
    }

    #[test]
    fn test_partition_by_submodule() {
        let generator = VitsGenerator::from_tensors(toy_generator_tensors(true)).unwrap();
        assert_eq!(generator.text_encoder.len(), 2);
        assert!(generator.text_encoder.get("embed_tokens.weight").is_some());
        assert_eq!(generator.flow.len(), 1);
        assert!(generator.embed_speaker.is_some());
        assert_eq!(generator.num_parameters(false), 5 * 4 + 10 + 12);
        assert_eq!(generator.num_parameters(true), 5 * 4);
    }

    #[test]
    fn test_single_speaker_has_no_embedding() {
        let generator = VitsGenerator::from_tensors(toy_generator_tensors(false)).unwrap();
        assert!(generator.embed_speaker.is_none());
        assert_eq!(generator.groups().count(), 5);
    }

    #[test]
    fn test_missing_required_group_rejected() {
        let mut tensors = toy_generator_tensors(false);
        tensors.remove("flow.layer.weight");
        let err = VitsGenerator::from_tensors(tensors).unwrap_err();
        assert!(err.to_string().contains("flow"));
    }

    #[test]
    fn test_unknown_prefix_dropped() {
        let mut tensors = toy_generator_tensors(false);
        tensors.insert(
            "stray.weight".to_string(),
            Tensor::ones(1, DType::F32, &Device::Cpu).unwrap(),
        );
        let generator = VitsGenerator::from_tensors(tensors).unwrap();
        assert_eq!(generator.groups().map(|g| g.len()).sum::<usize>(), 6);
    }
}

//! HiFi-GAN style multi-period discriminator
//!
//! Layout (parameter paths):
//! - `discriminators.0`: scale block, six 1-D convolutions + `final_conv`
//! - `discriminators.{1..=P}`: one period block per configured period,
//!   strided 2-D convolutions over the channel progression, a stride-1
//!   closing convolution + `final_conv`
//!
//! Only the parameter structure is modelled; there is no forward pass.

use candle_core::{Device, Tensor};

use super::conv::{ConvSpec, NormConv};
use crate::config::VitsConfig;
use crate::core::error::{ConvertError, Result};
use crate::core::traits::{Reparameterize, StateDict};

/// Which sub-discriminator a block is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Operates on the raw waveform
    Scale,
    /// Operates on the waveform folded by the given period
    Period(usize),
}

/// One sub-discriminator
#[derive(Debug, Clone)]
pub struct DiscriminatorBlock {
    kind: BlockKind,
    convs: Vec<NormConv>,
    final_conv: NormConv,
}

impl DiscriminatorBlock {
    /// Scale block over `channels = [in, c1, c2, c3, c4, ..]`
    pub fn scale(channels: &[usize], device: &Device) -> Result<Self> {
        let [c0, c1, c2, c3, c4] = match channels {
            [a, b, c, d, e, ..] => [*a, *b, *c, *d, *e],
            _ => {
                return Err(ConvertError::model_load(
                    "discriminator",
                    format!("scale block needs 5 channel entries, got {:?}", channels),
                ))
            }
        };

        let specs = [
            ConvSpec::conv1d(c0, c1, 15, 1, 1, 7),
            ConvSpec::conv1d(c1, c2, 41, 4, 4, 20),
            ConvSpec::conv1d(c2, c3, 41, 4, 16, 20),
            ConvSpec::conv1d(c3, c4, 41, 4, 64, 20),
            ConvSpec::conv1d(c4, c4, 41, 4, 256, 20),
            ConvSpec::conv1d(c4, c4, 5, 1, 1, 2),
        ];
        let convs = specs
            .into_iter()
            .map(|spec| NormConv::new(spec, device))
            .collect::<Result<Vec<_>>>()?;
        let final_conv = NormConv::new(ConvSpec::conv1d(c4, 1, 3, 1, 1, 1), device)?;

        Ok(Self {
            kind: BlockKind::Scale,
            convs,
            final_conv,
        })
    }

    /// Period block over `channels = [in, c1, .., cn]`
    pub fn period(
        period: usize,
        channels: &[usize],
        kernel_size: usize,
        stride: usize,
        device: &Device,
    ) -> Result<Self> {
        let last = match channels.last() {
            Some(&c) if channels.len() >= 2 => c,
            _ => {
                return Err(ConvertError::model_load(
                    "discriminator",
                    format!("period block needs at least 2 channel entries, got {:?}", channels),
                ))
            }
        };
        let padding = (kernel_size - 1) / 2;

        let mut convs = Vec::with_capacity(channels.len());
        for pair in channels.windows(2) {
            let spec = ConvSpec::conv2d_period(pair[0], pair[1], kernel_size, stride, padding);
            convs.push(NormConv::new(spec, device)?);
        }
        convs.push(NormConv::new(
            ConvSpec::conv2d_period(last, last, kernel_size, 1, padding),
            device,
        )?);
        let final_conv = NormConv::new(ConvSpec::conv2d_period(last, 1, 3, 1, 1), device)?;

        Ok(Self {
            kind: BlockKind::Period(period),
            convs,
            final_conv,
        })
    }

    /// Block assembled from existing layers
    pub fn from_layers(kind: BlockKind, convs: Vec<NormConv>, final_conv: NormConv) -> Self {
        Self {
            kind,
            convs,
            final_conv,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn convs(&self) -> &[NormConv] {
        &self.convs
    }

    pub fn final_conv(&self) -> &NormConv {
        &self.final_conv
    }

    fn named_parameters(&self, prefix: &str) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (j, conv) in self.convs.iter().enumerate() {
            params.extend(conv.named_parameters(&format!("{}.convs.{}", prefix, j)));
        }
        params.extend(self.final_conv.named_parameters(&format!("{}.final_conv", prefix)));
        params
    }

    fn set_parameter(&mut self, rest: &str, value: Tensor) -> Result<bool> {
        if let Some(local) = rest.strip_prefix("final_conv.") {
            return self.final_conv.set_parameter(local, value);
        }
        let Some((index, local)) = rest.strip_prefix("convs.").and_then(split_index) else {
            return Ok(false);
        };
        match self.convs.get_mut(index) {
            Some(conv) => conv.set_parameter(local, value),
            None => Ok(false),
        }
    }

    /// Apply weight normalization to every layer
    pub fn apply_weight_norm(&mut self) -> Result<()> {
        for conv in &mut self.convs {
            conv.apply_weight_norm()?;
        }
        self.final_conv.apply_weight_norm()
    }

    /// Remove weight normalization from every layer
    pub fn remove_weight_norm(&mut self) -> Result<()> {
        for conv in &mut self.convs {
            conv.remove_weight_norm()?;
        }
        self.final_conv.remove_weight_norm()
    }

    fn is_weight_normed(&self) -> bool {
        self.final_conv.is_weight_normed() || self.convs.iter().any(NormConv::is_weight_normed)
    }
}

/// Split `"3.weight_g"` into `(3, "weight_g")`
fn split_index(path: &str) -> Option<(usize, &str)> {
    let (index, rest) = path.split_once('.')?;
    Some((index.parse().ok()?, rest))
}

/// Multi-period discriminator
#[derive(Debug, Clone)]
pub struct VitsDiscriminator {
    discriminators: Vec<DiscriminatorBlock>,
}

impl VitsDiscriminator {
    /// Freshly initialised discriminator for a configuration
    pub fn new(config: &VitsConfig, device: &Device) -> Result<Self> {
        let mut discriminators = Vec::with_capacity(1 + config.discriminator_periods.len());
        discriminators.push(DiscriminatorBlock::scale(
            &config.discriminator_scale_channels,
            device,
        )?);
        for &period in &config.discriminator_periods {
            discriminators.push(DiscriminatorBlock::period(
                period,
                &config.discriminator_period_channels,
                config.discriminator_kernel_size,
                config.discriminator_stride,
                device,
            )?);
        }

        tracing::debug!(
            "Built discriminator with {} sub-discriminators (periods {:?})",
            discriminators.len(),
            config.discriminator_periods
        );
        Ok(Self { discriminators })
    }

    /// Discriminator assembled from existing blocks
    pub fn from_blocks(discriminators: Vec<DiscriminatorBlock>) -> Self {
        Self { discriminators }
    }

    pub fn discriminators(&self) -> &[DiscriminatorBlock] {
        &self.discriminators
    }
}

impl StateDict for VitsDiscriminator {
    fn name(&self) -> &str {
        "discriminator"
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.discriminators
            .iter()
            .enumerate()
            .flat_map(|(i, block)| block.named_parameters(&format!("discriminators.{}", i)))
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: Tensor) -> Result<bool> {
        let Some((index, rest)) = name.strip_prefix("discriminators.").and_then(split_index) else {
            return Ok(false);
        };
        match self.discriminators.get_mut(index) {
            Some(block) => block.set_parameter(rest, value).map_err(|e| match e {
                ConvertError::ModelLoad { message, .. } => {
                    ConvertError::model_load("discriminator", format!("{}: {}", name, message))
                }
                other => other,
            }),
            None => Ok(false),
        }
    }
}

impl Reparameterize for VitsDiscriminator {
    fn apply_weight_norm(&mut self) -> Result<()> {
        for block in &mut self.discriminators {
            block.apply_weight_norm()?;
        }
        Ok(())
    }

    fn remove_weight_norm(&mut self) -> Result<()> {
        for block in &mut self.discriminators {
            block.remove_weight_norm()?;
        }
        Ok(())
    }

    fn is_weight_normed(&self) -> bool {
        self.discriminators.iter().any(DiscriminatorBlock::is_weight_normed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> VitsConfig {
        VitsConfig {
            discriminator_periods: vec![2, 3],
            discriminator_period_channels: vec![1, 4, 8],
            discriminator_scale_channels: vec![1, 4, 16, 64, 256],
            ..Default::default()
        }
    }

    #[test]
    fn test_block_layout() {
        let device = Device::Cpu;
        let disc = VitsDiscriminator::new(&small_config(), &device).unwrap();
        let blocks = disc.discriminators();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind(), BlockKind::Scale);
        assert_eq!(blocks[0].convs().len(), 6);
        assert_eq!(blocks[1].kind(), BlockKind::Period(2));
        // two strided transitions + closing conv
        assert_eq!(blocks[1].convs().len(), 3);
        assert_eq!(blocks[2].final_conv().spec().out_channels, 1);
    }

    #[test]
    fn test_default_config_shapes_match_hifigan() {
        let device = Device::Cpu;
        let disc = VitsDiscriminator::new(&VitsConfig::default(), &device).unwrap();
        let w = disc.parameter("discriminators.0.convs.4.weight").unwrap();
        assert_eq!(w.dims(), &[1024, 4, 41]);
        let w = disc.parameter("discriminators.1.convs.0.weight").unwrap();
        assert_eq!(w.dims(), &[32, 1, 5, 1]);
        let w = disc.parameter("discriminators.5.final_conv.weight").unwrap();
        assert_eq!(w.dims(), &[1, 1024, 3, 1]);
        assert_eq!(disc.discriminators().len(), 6);
    }

    #[test]
    fn test_keys_switch_with_weight_norm() {
        let device = Device::Cpu;
        let mut disc = VitsDiscriminator::new(&small_config(), &device).unwrap();
        let plain = disc.state_dict_keys();
        assert!(plain.contains("discriminators.1.final_conv.weight"));
        assert!(!disc.is_weight_normed());

        disc.apply_weight_norm().unwrap();
        let expanded = disc.state_dict_keys();
        assert!(disc.is_weight_normed());
        assert!(!expanded.contains("discriminators.1.final_conv.weight"));
        assert!(expanded.contains("discriminators.1.final_conv.weight_g"));
        assert!(expanded.contains("discriminators.1.final_conv.weight_v"));
        assert_eq!(expanded.len(), plain.len() + plain.iter().filter(|k| k.ends_with(".weight")).count());

        disc.remove_weight_norm().unwrap();
        assert_eq!(disc.state_dict_keys(), plain);
    }

    #[test]
    fn test_set_parameter_routes_by_path() {
        let device = Device::Cpu;
        let mut disc = VitsDiscriminator::new(&small_config(), &device).unwrap();
        let bias = Tensor::ones(8, candle_core::DType::F32, &device).unwrap();
        assert!(disc.set_parameter("discriminators.2.convs.1.bias", bias).unwrap());

        let stored: Vec<f32> = disc
            .parameter("discriminators.2.convs.1.bias")
            .unwrap()
            .to_vec1()
            .unwrap();
        assert_eq!(stored, vec![1.0; 8]);

        let other = Tensor::ones(8, candle_core::DType::F32, &device).unwrap();
        assert!(!disc.set_parameter("discriminators.9.convs.1.bias", other.clone()).unwrap());
        assert!(!disc.set_parameter("generator.convs.1.bias", other).unwrap());
    }
}

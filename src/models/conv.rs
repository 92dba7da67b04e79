//! Convolution parameter holder with switchable weight normalization
//!
//! The converter never convolves anything, so a layer is just its
//! hyperparameters plus the tensors a checkpoint addresses by name:
//! `weight` and `bias`, or `weight_g`, `weight_v` and `bias` while
//! weight normalization is applied.

use candle_core::{DType, Device, Tensor};
use candle_nn::Init;

use super::weight_norm;
use crate::core::error::{ConvertError, Result};

/// Convolution hyperparameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    /// One entry per spatial dim: `[k]` for 1-D, `[k, 1]` for period 2-D convs
    pub kernel: Vec<usize>,
    pub stride: usize,
    pub groups: usize,
    pub padding: usize,
}

impl ConvSpec {
    /// 1-D convolution
    pub fn conv1d(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        groups: usize,
        padding: usize,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel: vec![kernel],
            stride,
            groups,
            padding,
        }
    }

    /// 2-D convolution with a `(kernel, 1)` window, as used per period
    pub fn conv2d_period(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel: vec![kernel, 1],
            stride,
            groups: 1,
            padding,
        }
    }

    /// Weight shape: [out, in / groups, *kernel]
    pub fn weight_shape(&self) -> Vec<usize> {
        let mut shape = vec![self.out_channels, self.in_channels / self.groups];
        shape.extend_from_slice(&self.kernel);
        shape
    }

    fn fan_in(&self) -> usize {
        (self.in_channels / self.groups) * self.kernel.iter().product::<usize>()
    }
}

/// Storage form of a convolution weight
#[derive(Debug, Clone)]
pub enum ConvWeight {
    /// Single tensor, the form inference code and saved models use
    Plain(Tensor),
    /// Magnitude and direction, the form training checkpoints use
    Normalized { weight_g: Tensor, weight_v: Tensor },
}

/// Convolution layer parameters
#[derive(Debug, Clone)]
pub struct NormConv {
    spec: ConvSpec,
    weight: ConvWeight,
    bias: Tensor,
}

impl NormConv {
    /// Fresh layer initialised like a newly constructed PyTorch convolution
    pub fn new(spec: ConvSpec, device: &Device) -> Result<Self> {
        if spec.groups == 0 || spec.in_channels % spec.groups != 0 {
            return Err(ConvertError::model_load(
                "conv",
                format!(
                    "in_channels {} not divisible by groups {}",
                    spec.in_channels, spec.groups
                ),
            ));
        }

        let bound = 1.0 / (spec.fan_in() as f64).sqrt();
        let init = Init::Uniform {
            lo: -bound,
            up: bound,
        };
        let weight = init
            .var(spec.weight_shape(), DType::F32, device)?
            .as_tensor()
            .clone();
        let bias = init
            .var(spec.out_channels, DType::F32, device)?
            .as_tensor()
            .clone();

        Ok(Self {
            spec,
            weight: ConvWeight::Plain(weight),
            bias,
        })
    }

    /// Layer built from existing tensors
    pub fn from_tensors(spec: ConvSpec, weight: Tensor, bias: Tensor) -> Result<Self> {
        let layer = Self {
            spec,
            weight: ConvWeight::Plain(weight.clone()),
            bias: bias.clone(),
        };
        layer.check_shape("weight", &weight)?;
        layer.check_shape("bias", &bias)?;
        Ok(layer)
    }

    pub fn spec(&self) -> &ConvSpec {
        &self.spec
    }

    pub fn is_weight_normed(&self) -> bool {
        matches!(self.weight, ConvWeight::Normalized { .. })
    }

    /// Fused weight regardless of storage form
    pub fn weight(&self) -> Result<Tensor> {
        match &self.weight {
            ConvWeight::Plain(w) => Ok(w.clone()),
            ConvWeight::Normalized { weight_g, weight_v } => weight_norm::fuse(weight_g, weight_v),
        }
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Parameters under `prefix`, e.g. `convs.0.weight_g`
    pub fn named_parameters(&self, prefix: &str) -> Vec<(String, Tensor)> {
        let mut params = Vec::with_capacity(3);
        params.push((format!("{}.bias", prefix), self.bias.clone()));
        match &self.weight {
            ConvWeight::Plain(w) => params.push((format!("{}.weight", prefix), w.clone())),
            ConvWeight::Normalized { weight_g, weight_v } => {
                params.push((format!("{}.weight_g", prefix), weight_g.clone()));
                params.push((format!("{}.weight_v", prefix), weight_v.clone()));
            }
        }
        params
    }

    /// Assign one parameter by local name (`weight`, `weight_g`, `weight_v`, `bias`)
    pub fn set_parameter(&mut self, local: &str, value: Tensor) -> Result<bool> {
        let slot = match (local, &mut self.weight) {
            ("bias", _) => &mut self.bias,
            ("weight", ConvWeight::Plain(w)) => w,
            ("weight_g", ConvWeight::Normalized { weight_g, .. }) => weight_g,
            ("weight_v", ConvWeight::Normalized { weight_v, .. }) => weight_v,
            _ => return Ok(false),
        };
        if slot.dims() != value.dims() {
            return Err(ConvertError::model_load(
                "conv",
                format!(
                    "shape mismatch for {}: expected {:?}, got {:?}",
                    local,
                    slot.dims(),
                    value.dims()
                ),
            ));
        }
        *slot = value.to_dtype(slot.dtype())?;
        Ok(true)
    }

    /// Switch to magnitude/direction storage
    pub fn apply_weight_norm(&mut self) -> Result<()> {
        if let ConvWeight::Plain(w) = &self.weight {
            let (weight_g, weight_v) = weight_norm::decompose(w)?;
            self.weight = ConvWeight::Normalized { weight_g, weight_v };
        }
        Ok(())
    }

    /// Fold magnitude/direction back into a single weight; no-op when plain
    pub fn remove_weight_norm(&mut self) -> Result<()> {
        if let ConvWeight::Normalized { weight_g, weight_v } = &self.weight {
            let fused = weight_norm::fuse(weight_g, weight_v)?;
            self.weight = ConvWeight::Plain(fused);
        }
        Ok(())
    }

    fn check_shape(&self, name: &str, tensor: &Tensor) -> Result<()> {
        let expected = match name {
            "bias" => vec![self.spec.out_channels],
            _ => self.spec.weight_shape(),
        };
        if tensor.dims() != expected.as_slice() {
            return Err(ConvertError::model_load(
                "conv",
                format!(
                    "shape mismatch for {}: expected {:?}, got {:?}",
                    name,
                    expected,
                    tensor.dims()
                ),
            ));
        }
        Ok(())
    }
}

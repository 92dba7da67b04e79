//! Weight normalization utilities
//!
//! Splits a convolution weight into magnitude (`weight_g`) and direction
//! (`weight_v`) and folds the pair back, using the PyTorch convention
//! `dim = 0`: the norm is taken over every dimension except the first.

use candle_core::{Tensor, D};

use crate::core::error::{ConvertError, Result};

const NORM_EPS: f64 = 1e-12;

/// L2 norm over all dims except the first, kept broadcastable
///
/// weight shape: [out_channels, ...] -> [out_channels, 1, ..., 1]
pub fn norm_except_dim0(weight: &Tensor) -> Result<Tensor> {
    let dims = weight.dims();
    if dims.len() < 2 {
        return Err(ConvertError::Internal {
            message: format!("weight norm needs a tensor of rank >= 2, got {:?}", dims),
        });
    }

    let mut keep_shape = vec![1usize; dims.len()];
    keep_shape[0] = dims[0];

    let norm = weight
        .flatten_from(1)?
        .sqr()?
        .sum_keepdim(D::Minus1)?
        .sqrt()?
        .reshape(keep_shape)?;
    Ok(norm)
}

/// Decompose a weight: returns `(weight_g, weight_v)`
pub fn decompose(weight: &Tensor) -> Result<(Tensor, Tensor)> {
    let weight_g = norm_except_dim0(weight)?;
    Ok((weight_g, weight.clone()))
}

/// Apply weight normalization: weight = g * (v / ||v||)
pub fn fuse(weight_g: &Tensor, weight_v: &Tensor) -> Result<Tensor> {
    // Avoid division by zero
    let norm = norm_except_dim0(weight_v)?.clamp(NORM_EPS, f64::MAX)?;
    let v_normalized = weight_v.broadcast_div(&norm)?;
    weight_g.broadcast_mul(&v_normalized).map_err(Into::into)
}

//! Scoped weight normalization around a checkpoint load
//!
//! Training checkpoints store convolution weights as `weight_g`/`weight_v`.
//! The destination module is expanded into that form only while loading
//! and is always folded back before the scope ends, including when the
//! load fails.

use std::ops::{Deref, DerefMut};

use crate::core::error::Result;
use crate::core::traits::Reparameterize;

/// Holds a module in its weight-normalized form until dropped or collapsed
pub struct WeightNormGuard<'a, M: Reparameterize + ?Sized> {
    module: &'a mut M,
    active: bool,
}

impl<'a, M: Reparameterize + ?Sized> WeightNormGuard<'a, M> {
    /// Expand `module`; on failure the module is restored before returning
    pub fn expand(module: &'a mut M) -> Result<Self> {
        if let Err(e) = module.apply_weight_norm() {
            if let Err(restore) = module.remove_weight_norm() {
                tracing::error!("Failed to restore module after expand error: {}", restore);
            }
            return Err(e);
        }
        tracing::debug!("Applied weight normalization");
        Ok(Self {
            module,
            active: true,
        })
    }

    /// Fold the module back, reporting any error
    pub fn collapse(mut self) -> Result<()> {
        self.active = false;
        self.module.remove_weight_norm()?;
        tracing::debug!("Removed weight normalization");
        Ok(())
    }
}

impl<M: Reparameterize + ?Sized> Deref for WeightNormGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        &*self.module
    }
}

impl<M: Reparameterize + ?Sized> DerefMut for WeightNormGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut *self.module
    }
}

impl<M: Reparameterize + ?Sized> Drop for WeightNormGuard<'_, M> {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = self.module.remove_weight_norm() {
                tracing::error!("Failed to remove weight normalization: {}", e);
            }
        }
    }
}

/// Run `f` on the expanded module, collapsing it afterwards on every path
///
/// An error from `f` takes precedence over an error from collapsing.
pub fn with_weight_norm<M, T, F>(module: &mut M, f: F) -> Result<T>
where
    M: Reparameterize + ?Sized,
    F: FnOnce(&mut M) -> Result<T>,
{
    let mut guard = WeightNormGuard::expand(module)?;
    match f(&mut *guard) {
        Ok(value) => {
            guard.collapse()?;
            Ok(value)
        }
        Err(e) => {
            drop(guard);
            Err(e)
        }
    }
}

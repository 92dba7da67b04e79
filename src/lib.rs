//! # vits-convert - VITS discriminator checkpoint converter
//!
//! Turns an original VITS/MMS discriminator training checkpoint into the
//! transformers `VitsModelForPreTraining` layout, next to an already
//! converted generator, so that training can resume from it.
//!
//! ## Features
//!
//! - **Key renaming**: ordered substring rules, collisions rejected
//! - **Strict validation**: extra/missing keys named exactly, with ignore suffixes
//! - **Scoped weight norm**: expand/collapse around the load on every exit path
//! - **Hub integration**: MMS language-code shorthand via hf-hub
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vits_convert::{convert_checkpoint, ConversionSource, ConvertOptions};
//!
//! let options = ConvertOptions::new(
//!     ConversionSource::LanguageCode("eng".to_string()),
//!     "mms-tts-eng-train",
//! );
//! let summary = convert_checkpoint(&options)?;
//! println!("{:.1}M params", summary.num_parameters as f64 / 1e6);
//! ```
//!
//! ## Adapting a module directly
//!
//! ```rust,ignore
//! use vits_convert::convert::{adapt_checkpoint, read_checkpoint, IgnorePatterns, RenameTable};
//!
//! let source = read_checkpoint("D_100000.pth", Some("model"), &device)?;
//! let report = adapt_checkpoint(
//!     &mut discriminator,
//!     source,
//!     &RenameTable::discriminator(),
//!     &IgnorePatterns::default(),
//! )?;
//! ```

pub mod config;
pub mod convert;
pub mod core;
pub mod export;
pub mod hub;
pub mod models;

// Re-exports for convenience
pub use config::{FeatureExtractorConfig, VitsConfig};
pub use convert::{
    adapt_checkpoint, assemble, convert_checkpoint, ConversionSource, ConversionSummary,
    ConvertOptions, IgnorePatterns, LoadReport, ParameterMapping, RenameTable,
};
pub use core::{
    error::{ConvertError, MismatchKind, Result, ResultExt},
    traits::{Reparameterize, StateDict},
};
pub use hub::HubConfig;
pub use models::{VitsDiscriminator, VitsGenerator, VitsModelForPreTraining};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

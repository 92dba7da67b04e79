//! Checkpoint adaptation
//!
//! - `checkpoint`: read a raw name -> tensor mapping from disk
//! - `key_mapper`: rename keys from the original to the transformers layout
//! - `validator`: extra/missing key gate with ignore suffixes
//! - `reparam`: scoped weight-norm expand/collapse
//! - `loader`: tolerant parameter assignment
//! - `assembler`: move generator submodules next to the discriminator
//! - `pipeline`: the whole conversion

pub mod assembler;
pub mod checkpoint;
pub mod key_mapper;
pub mod loader;
pub mod pipeline;
pub mod reparam;
pub mod validator;

pub use assembler::assemble;
pub use checkpoint::{read_checkpoint, CheckpointFormat, ParameterMapping, DEFAULT_CHECKPOINT_KEY};
pub use key_mapper::RenameTable;
pub use loader::{load_state_dict, LoadReport};
pub use pipeline::{
    adapt_checkpoint, convert_checkpoint, resolve_sources, ConversionSource, ConversionSummary,
    ConvertOptions, FEATURE_SIZE,
};
pub use reparam::{with_weight_norm, WeightNormGuard};
pub use validator::{validate, IgnorePatterns, KeyDiff, ATTENTION_BIAS_SUFFIX};

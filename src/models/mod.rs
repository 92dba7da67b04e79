//! Parameter containers for the VITS models involved in the conversion
//!
//! - `conv`: convolution parameters with switchable weight normalization
//! - `discriminator`: multi-period discriminator (the load destination)
//! - `generator`: already-converted generator, partitioned into submodules
//! - `pretraining`: combined generator + discriminator, the conversion output
//! - `params`: opaque named-tensor bundle for reused submodules
//! - `weight_norm`: magnitude/direction decomposition math

pub mod conv;
pub mod discriminator;
pub mod generator;
pub mod params;
pub mod pretraining;
pub mod weight_norm;

pub use conv::{ConvSpec, ConvWeight, NormConv};
pub use discriminator::{BlockKind, DiscriminatorBlock, VitsDiscriminator};
pub use generator::VitsGenerator;
pub use params::ParameterGroup;
pub use pretraining::VitsModelForPreTraining;

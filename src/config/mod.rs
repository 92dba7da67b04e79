//! Configuration types read from and written to model directories

mod feature_extractor;
mod model_config;

pub use feature_extractor::{FeatureExtractorConfig, PREPROCESSOR_CONFIG_FILE};
pub use model_config::{VitsConfig, CONFIG_FILE};

//! End-to-end conversion
//!
//! ```text
//! resolve sources ──► VitsConfig ──► VitsDiscriminator
//!                                         │
//!      read checkpoint ──► rename ──► [expand ─ validate ─ load ─ collapse]
//!                                         │
//!      VitsGenerator ──────────────► assemble ──► save ──► (publish)
//! ```

use candle_core::Device;
use std::path::PathBuf;

use super::assembler::assemble;
use super::checkpoint::{read_checkpoint, ParameterMapping, DEFAULT_CHECKPOINT_KEY};
use super::key_mapper::RenameTable;
use super::loader::{load_state_dict, LoadReport};
use super::reparam::with_weight_norm;
use super::validator::{validate, IgnorePatterns};
use crate::config::{FeatureExtractorConfig, VitsConfig};
use crate::core::error::{ConvertError, Result};
use crate::core::traits::{Reparameterize, StateDict};
use crate::export::copy_tokenizer_files;
use crate::hub::{self, HubConfig};
use crate::models::{VitsDiscriminator, VitsGenerator};

/// Mel bins of the exported feature extractor
pub const FEATURE_SIZE: usize = 80;

/// Where the discriminator checkpoint and the generator come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionSource {
    /// MMS language code; both inputs are fetched from the hub
    LanguageCode(String),
    /// Explicit checkpoint file and generator location (local dir or hub id)
    Paths { checkpoint: PathBuf, generator: String },
}

/// Options for [`convert_checkpoint`]
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub source: ConversionSource,
    pub output_dir: PathBuf,
    /// Top-level entry holding the state dict in a pickled checkpoint
    pub checkpoint_key: Option<String>,
    pub rename_table: RenameTable,
    pub ignore: IgnorePatterns,
    /// Hub repository to upload the output folder to
    pub push_to_hub: Option<String>,
    pub hub: HubConfig,
}

impl ConvertOptions {
    pub fn new(source: ConversionSource, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_dir: output_dir.into(),
            checkpoint_key: Some(DEFAULT_CHECKPOINT_KEY.to_string()),
            rename_table: RenameTable::discriminator(),
            ignore: IgnorePatterns::default(),
            push_to_hub: None,
            hub: HubConfig::default(),
        }
    }

    pub fn with_checkpoint_key(mut self, key: Option<String>) -> Self {
        self.checkpoint_key = key;
        self
    }

    pub fn with_rename_table(mut self, table: RenameTable) -> Self {
        self.rename_table = table;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnorePatterns) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_push_to_hub(mut self, repo_id: Option<String>) -> Self {
        self.push_to_hub = repo_id;
        self
    }

    pub fn with_hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }
}

/// What a finished conversion produced
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub checkpoint: PathBuf,
    pub generator_dir: PathBuf,
    pub model_file: PathBuf,
    pub discriminator: LoadReport,
    /// Combined model size, embeddings excluded
    pub num_parameters: usize,
    pub tokenizer_files: Vec<PathBuf>,
    pub preprocessor_file: PathBuf,
    pub pushed_to: Option<String>,
}

/// Rename `source`, check it against `module` and load it, all while the
/// module is in weight-normalized form
///
/// The module is collapsed back on every exit path. Validation runs before
/// any parameter is written, so a key mismatch leaves the module's values
/// untouched.
pub fn adapt_checkpoint<M>(
    module: &mut M,
    source: ParameterMapping,
    table: &RenameTable,
    ignore: &IgnorePatterns,
) -> Result<LoadReport>
where
    M: StateDict + Reparameterize + ?Sized,
{
    let renamed = table.apply(source)?;
    with_weight_norm(module, |m| {
        validate(&renamed, &m.state_dict_keys(), ignore)?;
        load_state_dict(m, renamed, false)
    })
}

/// Resolve the checkpoint file and generator directory
pub fn resolve_sources(source: &ConversionSource, hub_config: &HubConfig) -> Result<(PathBuf, PathBuf)> {
    match source {
        ConversionSource::LanguageCode(code) => {
            let checkpoint = hub::download_discriminator_checkpoint(code, hub_config)?;
            let generator = hub::resolve_model_dir(&hub::generator_repo_id(code), hub_config)?;
            Ok((checkpoint, generator))
        }
        ConversionSource::Paths { checkpoint, generator } => {
            if !checkpoint.exists() {
                return Err(ConvertError::Checkpoint {
                    message: "file not found".to_string(),
                    path: checkpoint.clone(),
                });
            }
            let generator = hub::resolve_model_dir(generator, hub_config)?;
            Ok((checkpoint.clone(), generator))
        }
    }
}

/// Convert an original discriminator checkpoint into a pre-training model folder
pub fn convert_checkpoint(options: &ConvertOptions) -> Result<ConversionSummary> {
    let span = tracing::info_span!("convert_checkpoint", output = %options.output_dir.display());
    let _enter = span.enter();
    let device = Device::Cpu;

    let (checkpoint, generator_dir) = resolve_sources(&options.source, &options.hub)?;
    tracing::info!("Checkpoint: {:?}", checkpoint);
    tracing::info!("Generator: {:?}", generator_dir);

    let config = VitsConfig::from_pretrained(&generator_dir)?;
    let mut discriminator = VitsDiscriminator::new(&config, &device)?;

    let source = read_checkpoint(&checkpoint, options.checkpoint_key.as_deref(), &device)?;
    let report = adapt_checkpoint(
        &mut discriminator,
        source,
        &options.rename_table,
        &options.ignore,
    )?;

    let generator = VitsGenerator::from_pretrained(&generator_dir, &device)?;
    let sampling_rate = config.sampling_rate;
    let model = assemble(config, generator, discriminator);
    let num_parameters = model.num_parameters(true);

    let model_file = model.save_pretrained(&options.output_dir)?;
    let tokenizer_files = copy_tokenizer_files(&generator_dir, &options.output_dir)?;
    let preprocessor_file =
        FeatureExtractorConfig::new(sampling_rate, FEATURE_SIZE).save_pretrained(&options.output_dir)?;
    tracing::info!("Saved converted model to {:?}", options.output_dir);

    if let Some(repo_id) = &options.push_to_hub {
        hub::publish_folder(repo_id, &options.output_dir, &options.hub)?;
    }

    Ok(ConversionSummary {
        checkpoint,
        generator_dir,
        model_file,
        discriminator: report,
        num_parameters,
        tokenizer_files,
        preprocessor_file,
        pushed_to: options.push_to_hub.clone(),
    })
}

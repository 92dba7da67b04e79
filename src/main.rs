//! vits-convert CLI - convert an original VITS discriminator checkpoint
//!
//! Produces a `VitsModelForPreTraining` folder (weights, config, tokenizer
//! and feature extractor files) from an MMS/VITS discriminator checkpoint and
//! an already converted generator.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vits_convert::convert::DEFAULT_CHECKPOINT_KEY;
use vits_convert::{convert_checkpoint, ConversionSource, ConvertOptions, HubConfig, VERSION};

/// Convert a VITS discriminator checkpoint to the transformers pre-training layout
#[derive(Parser, Debug)]
#[command(name = "vits-convert")]
#[command(author, version, about, long_about = None)]
#[command(long_about = "
Converts an original VITS discriminator checkpoint and a converted generator
into a single VitsModelForPreTraining folder.

Examples:
  # Convert the MMS English checkpoint straight from the hub
  vits-convert --language-code eng --pytorch-dump-folder-path mms-tts-eng-train

  # Convert local files
  vits-convert --checkpoint-path D_100000.pth \\
      --generator-checkpoint-path ./mms-tts-eng \\
      --pytorch-dump-folder-path ./out
")]
struct Cli {
    /// MMS language code; when set, the two paths below are ignored
    #[arg(long)]
    language_code: Option<String>,

    /// Local path to the original discriminator checkpoint
    #[arg(long)]
    checkpoint_path: Option<PathBuf>,

    /// Converted generator: local directory or hub repository id
    #[arg(long)]
    generator_checkpoint_path: Option<String>,

    /// Output directory
    #[arg(long)]
    pytorch_dump_folder_path: PathBuf,

    /// Hub repository to upload the converted model to
    #[arg(long)]
    push_to_hub: Option<String>,

    /// Top-level entry of the pickled checkpoint holding the state dict
    #[arg(long, default_value = DEFAULT_CHECKPOINT_KEY)]
    checkpoint_key: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn source(&self) -> Result<ConversionSource> {
        if let Some(code) = &self.language_code {
            return Ok(ConversionSource::LanguageCode(code.clone()));
        }
        match (&self.checkpoint_path, &self.generator_checkpoint_path) {
            (Some(checkpoint), Some(generator)) => Ok(ConversionSource::Paths {
                checkpoint: checkpoint.clone(),
                generator: generator.clone(),
            }),
            _ => bail!(
                "either --language-code or both --checkpoint-path and \
                 --generator-checkpoint-path are required"
            ),
        }
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn create_progress_bar(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    info!("vits-convert v{}", VERSION);

    let options = ConvertOptions::new(cli.source()?, cli.pytorch_dump_folder_path.clone())
        .with_checkpoint_key(Some(cli.checkpoint_key.clone()))
        .with_push_to_hub(cli.push_to_hub.clone())
        .with_hub(HubConfig::default());

    let start = Instant::now();
    let pb = create_progress_bar("Converting checkpoint...")?;
    let result = convert_checkpoint(&options);
    pb.finish_and_clear();
    let summary = result.context("Conversion failed")?;

    info!(
        "Loaded {} discriminator tensors ({} missing, {} unexpected)",
        summary.discriminator.loaded,
        summary.discriminator.missing.len(),
        summary.discriminator.unexpected.len()
    );
    info!(
        "Wrote {:?} ({:.1}M params) in {:.2}s",
        summary.model_file,
        summary.num_parameters as f64 / 1e6,
        start.elapsed().as_secs_f32()
    );
    if let Some(repo_id) = &summary.pushed_to {
        info!("Pushed to https://huggingface.co/{}", repo_id);
    }

    Ok(())
}

//! HuggingFace Hub access
//!
//! Resolves the two conversion inputs (the original discriminator
//! checkpoint and the converted generator directory) either locally or from
//! the hub, and publishes the converted model.
//!
//! # Layout of the MMS release
//! ```text
//! facebook/mms-tts/
//! └── full_models/
//!     └── {language_code}/
//!         └── D_100000.pth        original discriminator
//! facebook/mms-tts-{language_code}/
//! ├── config.json
//! ├── model.safetensors           converted generator
//! └── vocab.json ...
//! ```
//!
//! # Usage
//! ```rust,ignore
//! use vits_convert::hub::{self, HubConfig};
//!
//! let config = HubConfig::default();
//! let checkpoint = hub::download_discriminator_checkpoint("eng", &config)?;
//! let generator_dir = hub::resolve_model_dir(&hub::generator_repo_id("eng"), &config)?;
//! ```

mod config;

pub use config::{HubConfig, HubConfigBuilder, ModelSource, DEFAULT_REVISION};

use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::CONFIG_FILE;
use crate::core::error::{ConvertError, Result};
use crate::export::{OPTIONAL_TOKENIZER_FILES, VOCAB_FILE};
use crate::models::pretraining::WEIGHTS_FILE;

/// Repository holding the original MMS training checkpoints
pub const MMS_REPO: &str = "facebook/mms-tts";

/// File name of the discriminator inside a language folder
pub const DISCRIMINATOR_CHECKPOINT: &str = "D_100000.pth";

/// Path of the discriminator checkpoint for a language inside [`MMS_REPO`]
pub fn discriminator_checkpoint_path(language_code: &str) -> String {
    format!("full_models/{}/{}", language_code, DISCRIMINATOR_CHECKPOINT)
}

/// Repository of the already converted generator for a language
pub fn generator_repo_id(language_code: &str) -> String {
    format!("{}-{}", MMS_REPO, language_code)
}

/// Files making up a converted generator repository
pub fn generator_source(repo_id: &str) -> ModelSource {
    let mut optional_files: Vec<String> =
        OPTIONAL_TOKENIZER_FILES.iter().map(|f| f.to_string()).collect();
    optional_files.push(crate::config::PREPROCESSOR_CONFIG_FILE.to_string());
    ModelSource {
        repo_id: repo_id.to_string(),
        required_files: vec![
            CONFIG_FILE.to_string(),
            WEIGHTS_FILE.to_string(),
            VOCAB_FILE.to_string(),
        ],
        optional_files,
    }
}

fn build_api(config: &HubConfig) -> Result<Api> {
    let mut builder = ApiBuilder::new()
        .with_progress(config.show_progress)
        .with_token(config.hf_token.clone());
    if let Some(dir) = &config.cache_dir {
        builder = builder.with_cache_dir(dir.clone());
    }
    builder.build().map_err(|e| ConvertError::Resolution {
        message: format!("Failed to create HF API: {}", e),
        location: "huggingface.co".to_string(),
    })
}

fn model_repo(api: &Api, repo_id: &str, config: &HubConfig) -> hf_hub::api::sync::ApiRepo {
    api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        config.revision.clone(),
    ))
}

/// Download a single file, returning its cached path
pub fn download_file(repo_id: &str, filename: &str, config: &HubConfig) -> Result<PathBuf> {
    let api = build_api(config)?;
    tracing::info!("Downloading {} from {}", filename, repo_id);
    model_repo(&api, repo_id, config)
        .get(filename)
        .map_err(|e| ConvertError::Resolution {
            message: format!("Failed to download {}: {}", filename, e),
            location: repo_id.to_string(),
        })
}

/// Download the original discriminator checkpoint of an MMS language
pub fn download_discriminator_checkpoint(language_code: &str, config: &HubConfig) -> Result<PathBuf> {
    download_file(MMS_REPO, &discriminator_checkpoint_path(language_code), config)
}

/// Fetch every file of `source` into the cache, returning the snapshot directory
pub fn fetch_model_dir(source: &ModelSource, config: &HubConfig) -> Result<PathBuf> {
    let api = build_api(config)?;
    let repo = model_repo(&api, &source.repo_id, config);

    let mut snapshot: Option<PathBuf> = None;
    for filename in &source.required_files {
        let path = repo.get(filename).map_err(|e| ConvertError::Resolution {
            message: format!("Failed to download {}: {}", filename, e),
            location: source.repo_id.clone(),
        })?;
        if snapshot.is_none() {
            snapshot = path.parent().map(Path::to_path_buf);
        }
    }
    for filename in &source.optional_files {
        match repo.get(filename) {
            Ok(path) => {
                if snapshot.is_none() {
                    snapshot = path.parent().map(Path::to_path_buf);
                }
            }
            Err(e) => tracing::debug!("Optional file {} not fetched: {}", filename, e),
        }
    }

    snapshot.ok_or_else(|| ConvertError::Resolution {
        message: "no files fetched".to_string(),
        location: source.repo_id.clone(),
    })
}

/// Use `location` as a local model directory when it exists, else as a hub id
pub fn resolve_model_dir(location: &str, config: &HubConfig) -> Result<PathBuf> {
    let local = Path::new(location);
    if local.is_dir() {
        tracing::debug!("Using local model directory {:?}", local);
        return Ok(local.to_path_buf());
    }
    tracing::info!("{} is not a local directory, fetching from the hub", location);
    fetch_model_dir(&generator_source(location), config)
}

/// Upload every file of `folder` to `repo_id`
///
/// `hf-hub` only downloads, so uploads go through the `huggingface-cli`
/// executable, which must be on `PATH` and logged in (or given `HF_TOKEN`).
pub fn publish_folder(repo_id: &str, folder: &Path, config: &HubConfig) -> Result<()> {
    tracing::info!("Pushing {:?} to {}", folder, repo_id);
    let mut command = Command::new("huggingface-cli");
    command.arg("upload").arg(repo_id).arg(folder).arg(".");
    if let Some(token) = &config.hf_token {
        command.env("HF_TOKEN", token);
    }

    let output = command.output().map_err(|e| ConvertError::Resolution {
        message: format!("failed to run huggingface-cli: {}", e),
        location: repo_id.to_string(),
    })?;
    if !output.status.success() {
        return Err(ConvertError::Resolution {
            message: format!(
                "upload failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            location: repo_id.to_string(),
        });
    }
    Ok(())
}

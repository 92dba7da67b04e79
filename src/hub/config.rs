//! Hub access configuration
//!
//! Token, cache location and revision used for every download and upload.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default branch fetched from model repositories
pub const DEFAULT_REVISION: &str = "main";

/// Hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// HuggingFace token (optional, for gated or private repositories)
    pub hf_token: Option<String>,
    /// Enable download progress bars
    pub show_progress: bool,
    /// Override of the HuggingFace cache directory
    pub cache_dir: Option<PathBuf>,
    /// Revision/branch to fetch
    pub revision: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hf_token: std::env::var("HF_TOKEN").ok(),
            show_progress: true,
            cache_dir: std::env::var("HUGGINGFACE_HUB_CACHE").ok().map(PathBuf::from),
            revision: DEFAULT_REVISION.to_string(),
        }
    }
}

impl HubConfig {
    /// Create builder for HubConfig
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }
}

/// Builder for HubConfig
#[derive(Debug, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    /// Set HuggingFace token
    pub fn hf_token(mut self, token: impl Into<String>) -> Self {
        self.config.hf_token = Some(token.into());
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    /// Set cache directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.config.revision = revision.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> HubConfig {
        self.config
    }
}

/// Files to fetch from one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    /// Repository id on the hub (e.g., "facebook/mms-tts-eng")
    pub repo_id: String,
    /// Files whose absence is an error
    pub required_files: Vec<String>,
    /// Files fetched when present
    pub optional_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert!(config.show_progress);
        assert_eq!(config.revision, DEFAULT_REVISION);
    }

    #[test]
    fn test_hub_config_builder() {
        let config = HubConfig::builder()
            .hf_token("test_token")
            .show_progress(false)
            .revision("refs/pr/1")
            .build();

        assert_eq!(config.hf_token, Some("test_token".to_string()));
        assert!(!config.show_progress);
        assert_eq!(config.revision, "refs/pr/1");
    }
}

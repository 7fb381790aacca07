//! Runtime configuration.
//!
//! The engine consumes a frozen configuration map supplied by the host;
//! loading, persistence and the settings UI are the host's business.
//! `Config::from_json_value` accepts the host's JSON map and fills every
//! missing key with its default.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The supplied map could not be deserialized.
    #[error("Invalid configuration: {message}")]
    Parse {
        /// What went wrong.
        message: String,
    },

    /// A value is out of its accepted range.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Frozen engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem root of the ComfyUI model tree.
    pub comfy_path: PathBuf,
    /// Bearer token added to remote requests when non-empty.
    pub api_key: String,
    /// Maximum preview images fetched per model.
    pub top_image_count: usize,
    /// Pagination size hint for the remote client.
    pub fetch_batch_size: u32,
    /// Fetch the model binary.
    pub download_model: bool,
    /// Fetch preview images.
    pub download_images: bool,
    /// Include images flagged nsfw.
    pub download_nsfw: bool,
    /// Parallel image workers per job.
    pub download_threads: usize,
    /// Emit `model_card.html` after a successful download.
    pub create_html: bool,
    /// Open the gallery in the host browser after emission.
    pub auto_open_html: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            comfy_path: PathBuf::new(),
            api_key: String::new(),
            top_image_count: 9,
            fetch_batch_size: 100,
            download_model: true,
            download_images: true,
            download_nsfw: false,
            download_threads: 4,
            create_html: true,
            auto_open_html: false,
        }
    }
}

impl Config {
    /// Build a configuration from the host's JSON map.
    ///
    /// Unknown keys are ignored; missing keys take their defaults.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "download_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.fetch_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The bearer token, or `None` when unset.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(&self.api_key)
        }
    }
}

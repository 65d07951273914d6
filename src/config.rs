//! YAML configuration for paths and fetch timeouts.
//!
//! Every field has a default, so an absent config file and an empty
//! config file both yield a working setup. The file is only read when
//! the user passes `--config`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::ClipError;
use crate::fetch::{DYNAMIC_TIMEOUT_SECS, STATIC_TIMEOUT_SECS};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the .docx template the compiler clones blocks from.
    pub template_path: PathBuf,
    /// Directory compiled documents are written into.
    pub output_dir: PathBuf,
    pub static_timeout_secs: u64,
    pub dynamic_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("templates/新聞輸出範本.docx"),
            output_dir: PathBuf::from("."),
            static_timeout_secs: STATIC_TIMEOUT_SECS,
            dynamic_timeout_secs: DYNAMIC_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or fall back to defaults when no
    /// path is given.
    pub fn load(path: Option<&str>) -> Result<Self, ClipError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&raw)
                    .map_err(|e| ClipError::Parse(format!("config {path}: {e}")))?;
                info!(config_path = path, "Loaded configuration");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn static_timeout(&self) -> Duration {
        Duration::from_secs(self.static_timeout_secs)
    }

    pub fn dynamic_timeout(&self) -> Duration {
        Duration::from_secs(self.dynamic_timeout_secs)
    }
}

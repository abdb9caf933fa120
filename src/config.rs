use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::recompress::DEFAULT_QUALITY;

/// Top-level configuration for the depthslim library.
///
/// Controls which files are considered, how hard the re-encode squeezes,
/// and where outputs land.
///
/// # Loading
///
/// ```rust,no_run
/// use depthslim::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.recompression.quality = 90;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which files the scan considers at all.
    pub scan: ScanConfig,
    /// JPEG re-encode parameters.
    pub recompression: RecompressionConfig,
    /// Output naming and placement.
    pub output: OutputConfig,
}

/// Candidate selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Files below this size are skipped without opening them; depth-effect
    /// photos carry a payload that puts them well above it.
    pub min_size_bytes: u64,
}

/// JPEG re-encode parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecompressionConfig {
    /// Encode quality, 1-100.
    pub quality: u8,
}

/// Output naming and placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Inserted between the source stem and the timestamp in output names.
    pub suffix: String,
    /// Where outputs land; `None` keeps them next to their sources.
    pub directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig {
                min_size_bytes: 1024 * 1024,
            },
            recompression: RecompressionConfig {
                quality: DEFAULT_QUALITY,
            },
            output: OutputConfig {
                suffix: "slim".to_string(),
                directory: None,
            },
        }
    }
}

impl Config {
    /// Resolve the config file path — same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}

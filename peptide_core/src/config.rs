//! Configuration file support for ptrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ptrack/config.toml`.

use crate::reconcile::PastDuePolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Schedule expansion and reconciliation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Route shown on doses whose cycle does not set one
    #[serde(default = "default_route")]
    pub default_route: String,

    #[serde(default)]
    pub past_due: PastDuePolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_route: default_route(),
            past_due: PastDuePolicy::default(),
        }
    }
}

/// Progress bar settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_segments")]
    pub segments: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            segments: default_segments(),
        }
    }
}

// Default value functions
fn home_relative(suffix: &str) -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(suffix)
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_relative(".local/share"));
    base.join("ptrack")
}

fn default_route() -> String {
    "subcutaneous".into()
}

fn default_segments() -> usize {
    10
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.schedule.default_route.trim().is_empty() {
            return Err(Error::Config("schedule.default_route is empty".into()));
        }
        if self.progress.segments == 0 || self.progress.segments > 100 {
            return Err(Error::Config(format!(
                "progress.segments must be between 1 and 100, got {}",
                self.progress.segments
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_relative(".config"));
        base.join("ptrack").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

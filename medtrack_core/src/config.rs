//! Configuration file support for MedTrack.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medtrack/config.toml`.

use crate::clock::DayKeyPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleRules,

    #[serde(default)]
    pub display: DisplayConfig,
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

/// Where every-other-day parity is counted from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EveryOtherDayAnchor {
    /// One shared parity for all medications, counted from 1970-01-01
    #[default]
    Global,
    /// Count from each medication's `anchorDate`, falling back to global
    PerMedication,
}

/// How `custom` frequencies are treated when building an agenda
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFrequencyPolicy {
    #[default]
    NotDue,
    AlwaysDue,
}

/// Scheduling rules handed to the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleRules {
    #[serde(default)]
    pub day_key: DayKeyPolicy,

    #[serde(default)]
    pub every_other_day_anchor: EveryOtherDayAnchor,

    #[serde(default)]
    pub custom_frequency: CustomFrequencyPolicy,
}

/// Agenda presentation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,

    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: default_low_stock_threshold(),
            window_minutes: default_window_minutes(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("medtrack")
}

fn default_low_stock_threshold() -> i64 {
    10
}

fn default_window_minutes() -> i64 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
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

    /// Reject values the agenda cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.display.window_minutes < 0 || self.display.window_minutes > 12 * 60 {
            return Err(Error::Config(format!(
                "display.window_minutes must be between 0 and 720, got {}",
                self.display.window_minutes
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("medtrack").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
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

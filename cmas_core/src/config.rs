//! Configuration file support for the CMAS tracker.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cmas/config.toml`.

use crate::{Error, Result, Role};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub assessment: AssessmentConfig,

    #[serde(default)]
    pub trend: TrendConfig,

    /// Profiles seeded into an empty registry
    #[serde(default)]
    pub patients: Vec<SeedPatient>,
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

/// Assessment shape
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Distinct catalog items a complete measurement must score
    #[serde(default = "default_required_exercises")]
    pub required_exercises: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            required_exercises: default_required_exercises(),
        }
    }
}

/// Trend classification policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Points the latest score must move past the baseline
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Number of oldest measurements averaged into the baseline
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            baseline_window: default_baseline_window(),
        }
    }
}

/// Patient profile declared in the config file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedPatient {
    pub patient_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub diagnosis_date: Option<NaiveDate>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("cmas")
}

fn default_required_exercises() -> usize {
    crate::catalog::STANDARD_EXERCISE_COUNT
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_baseline_window() -> usize {
    1
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

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cmas").join("config.toml")
    }

    /// Reject settings the scoring code cannot work with
    pub fn validate(&self) -> Result<()> {
        let items = crate::catalog::get_default_catalog().exercises.len();
        if self.assessment.required_exercises == 0 || self.assessment.required_exercises > items {
            return Err(Error::Config(format!(
                "assessment.required_exercises must be between 1 and {}",
                items
            )));
        }
        if !(self.trend.tolerance >= 0.0) {
            return Err(Error::Config("trend.tolerance must not be negative".into()));
        }
        if self.trend.baseline_window == 0 {
            return Err(Error::Config("trend.baseline_window must be at least 1".into()));
        }
        Ok(())
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

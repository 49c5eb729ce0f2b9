pub mod gains;
pub mod types;

pub use gains::{GainKey, GainStore, MemoryGainStore, MixSettings, TomlGainStore, clamp_volume};
pub use types::*;

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub options: ProcessingOptions,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl AppConfig {
    /// Load configuration from TOML file, or create default if not found
    pub fn load() -> Self {
        let config_path = Self::config_path();

        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config: {}. Using defaults.", e);
                }
            }
        }

        let config = Self::default();
        // Save default config for future editing
        if let Err(e) = config.save_to(&config_path) {
            warn!("Failed to save default config: {}", e);
        }
        config
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Load and validate configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        if self.output.container.is_empty() {
            return Err(AppError::Config(
                "Output container must not be empty".to_string(),
            ));
        }
        if self.output.suffix.is_empty() {
            // An empty suffix would make the output overwrite the source
            return Err(AppError::Config("Output suffix must not be empty".to_string()));
        }
        if self.output.temp_dir_name.is_empty() || self.output.backup_dir_name.is_empty() {
            return Err(AppError::Config(
                "Temp and backup directory names must not be empty".to_string(),
            ));
        }
        if self.preview.duration_secs == 0 {
            return Err(AppError::Config(
                "Preview duration must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory holding `config.toml` and `gains.toml`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dubmix")
}

use crate::errors::{BananaError, BananaResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for the config directory
pub const APP_NAME: &str = "nano-banana";

/// Configuration for the Nano Banana nodes.
///
/// Every field is optional so a file only needs to carry what it overrides.
/// Credentials found in the environment take precedence over the file (see
/// [`crate::auth::CallingConvention::detect_from`]).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BananaConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub model_name: Option<String>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
    pub temperature: Option<f32>,
    /// Overrides the API host, mostly for proxies and tests
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl Default for BananaConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            project_id: None,
            location: None,
            model_name: Some(crate::types::DEFAULT_MODEL.to_string()),
            aspect_ratio: Some("1:1".to_string()),
            image_size: Some("2K".to_string()),
            temperature: Some(1.0),
            base_url: None,
            request_timeout_secs: Some(300),
            connect_timeout_secs: Some(10),
        }
    }
}

impl BananaConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> BananaResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                BananaError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                BananaError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            Ok(Self::default().merge(&config))
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> BananaResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            BananaError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BananaError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            BananaError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            project_id: other.project_id.clone().or_else(|| self.project_id.clone()),
            location: other.location.clone().or_else(|| self.location.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            aspect_ratio: other
                .aspect_ratio
                .clone()
                .or_else(|| self.aspect_ratio.clone()),
            image_size: other.image_size.clone().or_else(|| self.image_size.clone()),
            temperature: other.temperature.or(self.temperature),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
        }
    }

    /// Loads the config file from its default location
    pub fn load_default() -> BananaResult<Self> {
        Self::load_from_file(&get_default_config_file(APP_NAME)?)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> BananaResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        BananaError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> BananaResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

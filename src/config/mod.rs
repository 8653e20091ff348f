//! Configuration module
//!
//! Handles loading and saving keycast configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consent::PromptRequest;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Consent prompt wording
    #[serde(default)]
    pub consent: ConsentConfig,

    /// Capture loop settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Relay settings
    #[serde(default)]
    pub relay: RelayConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Human-readable name for this session's host
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            verbose: false,
        }
    }
}

/// Consent prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentConfig {
    /// Prompt window title
    #[serde(default = "default_consent_title")]
    pub title: String,
    /// Prompt body
    #[serde(default = "default_consent_message")]
    pub message: String,
    /// Fine print shown under the body
    #[serde(default = "default_consent_detail")]
    pub detail: String,
}

fn default_consent_title() -> String {
    "Share your input?".to_string()
}

fn default_consent_message() -> String {
    "keycast wants to capture keyboard input and relay it to the display surface.".to_string()
}

fn default_consent_detail() -> String {
    "Nothing is captured until you approve, and you can revoke at any time.".to_string()
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            title: default_consent_title(),
            message: default_consent_message(),
            detail: default_consent_detail(),
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Enable the pointer modality (requires a host-provided pointer source)
    #[serde(default)]
    pub pointer_enabled: bool,
    /// Minimum interval between pointer move events (ms)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Pointer sampling interval (ms)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Raw key transition buffer size
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_throttle_ms() -> u64 {
    16
}

fn default_tick_ms() -> u64 {
    4
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pointer_enabled: false,
            throttle_ms: default_throttle_ms(),
            tick_ms: default_tick_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Ingress queue capacity
    #[serde(default = "default_relay_capacity")]
    pub capacity: usize,
}

fn default_relay_capacity() -> usize {
    256
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            capacity: default_relay_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("keycast/config.toml")),
            Some(PathBuf::from("./keycast.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build the consent prompt request from the configured wording
    pub fn consent_request(&self) -> PromptRequest {
        PromptRequest::consent(
            &self.consent.title,
            &self.consent.message,
            &self.consent.detail,
        )
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            name: "my-workstation".to_string(),
            verbose: false,
        },
        capture: CaptureConfig {
            pointer_enabled: true,
            ..Default::default()
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.capture.pointer_enabled);
        assert_eq!(config.capture.throttle_ms, 16);
        assert_eq!(config.capture.tick_ms, 4);
        assert_eq!(config.relay.capacity, 256);
    }

    #[test]
    fn test_save_and_load() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.capture.throttle_ms, config.capture.throttle_ms);
        assert_eq!(loaded.consent.title, config.consent.title);
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.general.name, "my-workstation");
        assert!(parsed.capture.pointer_enabled);
    }

    #[test]
    fn test_consent_request_uses_configured_wording() {
        let mut config = Config::default();
        config.consent.title = "Allow capture?".to_string();

        let request = config.consent_request();
        assert_eq!(request.title, "Allow capture?");
        assert_eq!(request.default_option, 1);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = Config::load(Path::new("/nonexistent/keycast.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}

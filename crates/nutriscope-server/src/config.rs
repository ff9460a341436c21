//! Configuration module for Nutriscope Server
//!
//! Handles loading configuration from TOML files with per-field defaults.

use crate::model::registry::ModelVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Simulated retraining schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    /// Delay between two progress ticks of a job
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Percentage points added per tick
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
}

/// Request telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Trailing window used for requests-per-minute
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How often expired timestamps are evicted from the window
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

/// Initial model metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_model_version")]
    pub version: String,
    #[serde(default = "default_framework")]
    pub framework: String,
}

/// Artificial latency of the mock endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_predict_latency_ms")]
    pub predict_latency_ms: u64,
    #[serde(default = "default_visualization_latency_ms")]
    pub visualization_latency_ms: u64,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_progress_step() -> u8 {
    5
}
fn default_window_secs() -> u64 {
    60
}
fn default_maintenance_interval_secs() -> u64 {
    5
}
fn default_model_name() -> String {
    "Malnutrition Analysis Model".to_string()
}
fn default_model_version() -> String {
    "1.2.0".to_string()
}
fn default_framework() -> String {
    "TensorFlow.js".to_string()
}
fn default_predict_latency_ms() -> u64 {
    500
}
fn default_visualization_latency_ms() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_step: default_progress_step(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            version: default_model_version(),
            framework: default_framework(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            predict_latency_ms: default_predict_latency_ms(),
            visualization_latency_ms: default_visualization_latency_ms(),
        }
    }
}

impl TrainingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl MetricsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl SimulationConfig {
    /// Configuration with every artificial delay disabled (used by tests)
    pub fn instant() -> Self {
        Self {
            predict_latency_ms: 0,
            visualization_latency_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.nutriscope/config.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nutriscope")
            .join("config.toml")
    }

    /// Validate configuration - always called on startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training.progress_step == 0 || self.training.progress_step > 100 {
            return Err(ConfigError::Invalid(format!(
                "training.progress_step must be within 1..=100, got {}",
                self.training.progress_step
            )));
        }

        if self.training.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "training.tick_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.metrics.window_secs == 0 || self.metrics.maintenance_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "metrics.window_secs and metrics.maintenance_interval_secs must be greater than zero"
                    .to_string(),
            ));
        }

        self.model
            .version
            .parse::<ModelVersion>()
            .map_err(|e| ConfigError::Invalid(format!("model.version: {}", e)))?;

        Ok(())
    }

    /// Non-fatal observations about the configuration, logged at startup
    pub fn validate_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.metrics.maintenance_interval_secs > self.metrics.window_secs {
            warnings.push(format!(
                "metrics.maintenance_interval_secs ({}) exceeds metrics.window_secs ({}); requestsPerMinute will lag",
                self.metrics.maintenance_interval_secs, self.metrics.window_secs
            ));
        }

        if 100 % self.training.progress_step as u32 != 0 {
            warnings.push(format!(
                "training.progress_step ({}) does not divide 100; the final tick is clamped",
                self.training.progress_step
            ));
        }

        warnings
    }
}

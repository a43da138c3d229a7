//! Configuration module for the GGUF speech gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use gguf_tts_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::model::{DevicePreference, PrecisionPreference};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use utils::default_hub_cache;
pub use yaml::YamlConfig;

/// Default hub repository the converted weights are published under
pub const DEFAULT_MODEL_ID: &str = "callgg/vibevoice-bf16";

/// Default per-request generation limit in seconds
pub const DEFAULT_GENERATION_TIMEOUT_SECONDS: u64 = 300;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Model discovery (explicit GGUF path or scan directory, hub model id)
/// - Conversion cache location
/// - Device and precision preferences
/// - Generation limits and CORS
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Model settings
    /// Explicit GGUF file; when unset `model_dir` is scanned
    pub model_path: Option<PathBuf>,
    /// Directory scanned for GGUF files (default: current directory)
    pub model_dir: Option<PathBuf>,
    /// Hub model identifier, e.g. "callgg/vibevoice-bf16"
    pub model_id: String,

    /// Hub cache root for converted weights (default: Hugging Face hub cache)
    pub cache_path: Option<PathBuf>,

    pub device: DevicePreference,
    pub precision: PrecisionPreference,

    // Generation settings
    /// Per-request generation limit; 0 disables the limit
    pub generation_timeout_seconds: u64,
    /// Clamp `speed` to [0.25, 4.0] before using it as the guidance scale
    pub clamp_speed: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: "*"
    pub cors_allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            model_path: None,
            model_dir: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            cache_path: None,
            device: DevicePreference::Auto,
            precision: PrecisionPreference::Auto,
            generation_timeout_seconds: DEFAULT_GENERATION_TIMEOUT_SECONDS,
            clamp_speed: false,
            cors_allowed_origins: "*".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded into the environment by `main.rs` before this
    /// is called, so actual environment variables override .env values.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Directory scanned for GGUF files
    pub fn resolved_model_dir(&self) -> PathBuf {
        self.model_dir.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Hub cache root used for converted weights
    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(default_hub_cache)
    }

    /// Per-request generation limit, `None` when disabled
    pub fn generation_timeout(&self) -> Option<Duration> {
        (self.generation_timeout_seconds > 0)
            .then(|| Duration::from_secs(self.generation_timeout_seconds))
    }

    /// Identifier advertised by `/v1/models`
    ///
    /// `vibevoice-<stem>` for an explicit model file, `vibevoice` otherwise.
    pub fn advertised_model_id(&self) -> String {
        self.model_path
            .as_ref()
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
            .map(|stem| format!("vibevoice-{stem}"))
            .unwrap_or_else(|| "vibevoice".to_string())
    }
}

fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validation::validate_tls(&config.tls)?;
    validation::validate_model_id(&config.model_id)?;
    validation::validate_model_path(&config.model_path)?;
    Ok(())
}

use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     enabled: true
///     cert_path: "/etc/ssl/gateway.pem"
///     key_path: "/etc/ssl/gateway.key"
///
/// model:
///   path: "/models/vibevoice-q4_0.gguf"
///   dir: "/models"
///   id: "callgg/vibevoice-bf16"
///   device: "cuda"
///   precision: "bf16"
///
/// cache:
///   path: "/var/cache/huggingface/hub"
///
/// generation:
///   timeout_seconds: 300
///   clamp_speed: false
///
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub model: Option<ModelYaml>,
    pub cache: Option<CacheYaml>,
    pub generation: Option<GenerationYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Model discovery and loading from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelYaml {
    /// Explicit GGUF file
    pub path: Option<String>,
    /// Directory scanned for GGUF files
    pub dir: Option<String>,
    /// Hub model identifier
    pub id: Option<String>,
    /// auto, cpu, cuda or metal
    pub device: Option<String>,
    /// auto, bf16 or f32
    pub precision: Option<String>,
}

/// Conversion cache configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYaml {
    pub path: Option<String>,
}

/// Generation limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GenerationYaml {
    pub timeout_seconds: Option<u64>,
    pub clamp_speed: Option<bool>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Comma-separated list of origins, or "*"
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

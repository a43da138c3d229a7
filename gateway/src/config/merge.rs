use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};

/// Merge YAML overrides onto the environment-derived configuration
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                _ => match (tls.cert_path, tls.key_path) {
                    (Some(cert_path), Some(key_path)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert_path),
                            key_path: PathBuf::from(key_path),
                        });
                    }
                    (None, None) if tls.enabled.is_none() => {}
                    _ => {
                        return Err(
                            "server.tls requires both cert_path and key_path when enabled".into(),
                        );
                    }
                },
            }
        }
    }

    if let Some(model) = yaml.model {
        if let Some(path) = model.path {
            config.model_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = model.dir {
            config.model_dir = Some(PathBuf::from(dir));
        }
        if let Some(id) = model.id {
            config.model_id = id;
        }
        if let Some(device) = model.device {
            config.device = device.parse()?;
        }
        if let Some(precision) = model.precision {
            config.precision = precision.parse()?;
        }
    }

    if let Some(path) = yaml.cache.and_then(|cache| cache.path) {
        config.cache_path = Some(PathBuf::from(path));
    }

    if let Some(generation) = yaml.generation {
        if let Some(timeout) = generation.timeout_seconds {
            config.generation_timeout_seconds = timeout;
        }
        if let Some(clamp) = generation.clamp_speed {
            config.clamp_speed = clamp;
        }
    }

    if let Some(origins) = yaml.security.and_then(|security| security.cors_allowed_origins) {
        config.cors_allowed_origins = origins;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::cleanup_env_vars;
    use crate::core::model::DevicePreference;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_merge_without_yaml_uses_env() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("MODEL_ID", "env/model");
        }

        let config = merge_config(None).unwrap();
        assert_eq!(config.model_id, "env/model");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_rejects_invalid_device() {
        cleanup_env_vars();

        let yaml: YamlConfig = serde_yaml::from_str("model:\n  device: \"quantum\"\n").unwrap();
        assert!(merge_config(Some(yaml)).is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls_disabled_clears_env_tls() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("TLS_CERT_PATH", "/env/cert.pem");
            std::env::set_var("TLS_KEY_PATH", "/env/key.pem");
        }

        let yaml: YamlConfig =
            serde_yaml::from_str("server:\n  tls:\n    enabled: false\n").unwrap();
        let config = merge_config(Some(yaml)).unwrap();
        assert!(config.tls.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_model_section() {
        cleanup_env_vars();

        let yaml: YamlConfig = serde_yaml::from_str(
            "model:\n  path: \"/m/voice.gguf\"\n  device: \"cpu\"\n",
        )
        .unwrap();
        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.model_path, Some(PathBuf::from("/m/voice.gguf")));
        assert_eq!(config.device, DevicePreference::Cpu);

        cleanup_env_vars();
    }
}

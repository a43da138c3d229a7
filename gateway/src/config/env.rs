use std::path::PathBuf;

use super::utils::{env_var, parse_env, parse_env_bool};
use super::{ServerConfig, TlsConfig};

/// Build a configuration from environment variables over defaults
///
/// Recognized variables: HOST, PORT, TLS_CERT_PATH, TLS_KEY_PATH, MODEL_PATH,
/// MODEL_DIR, MODEL_ID, CACHE_PATH, DEVICE, PRECISION,
/// GENERATION_TIMEOUT_SECONDS, CLAMP_SPEED, CORS_ALLOWED_ORIGINS.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_env::<u16>("PORT")? {
        config.port = port;
    }

    config.tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert_path), Some(key_path)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
    };

    config.model_path = env_var("MODEL_PATH").map(PathBuf::from);
    config.model_dir = env_var("MODEL_DIR").map(PathBuf::from);
    if let Some(model_id) = env_var("MODEL_ID") {
        config.model_id = model_id;
    }
    config.cache_path = env_var("CACHE_PATH").map(PathBuf::from);

    if let Some(device) = parse_env("DEVICE")? {
        config.device = device;
    }
    if let Some(precision) = parse_env("PRECISION")? {
        config.precision = precision;
    }

    if let Some(timeout) = parse_env::<u64>("GENERATION_TIMEOUT_SECONDS")? {
        config.generation_timeout_seconds = timeout;
    }
    if let Some(clamp) = parse_env_bool("CLAMP_SPEED")? {
        config.clamp_speed = clamp;
    }
    if let Some(origins) = env_var("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = origins;
    }

    Ok(config)
}

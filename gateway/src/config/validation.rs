use std::path::PathBuf;

use super::TlsConfig;

/// TLS certificate and key must both exist when TLS is configured
pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(tls) = tls else {
        return Ok(());
    };

    if !tls.cert_path.is_file() {
        return Err(format!(
            "TLS certificate file not found: {}",
            tls.cert_path.display()
        )
        .into());
    }
    if !tls.key_path.is_file() {
        return Err(format!("TLS key file not found: {}", tls.key_path.display()).into());
    }
    Ok(())
}

/// Model ids become cache directory names, so they must stay inside the cache
pub(super) fn validate_model_id(model_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if model_id.trim().is_empty() {
        return Err("MODEL_ID cannot be empty".into());
    }
    if model_id.contains("..") || model_id.starts_with('/') || model_id.contains('\\') {
        return Err(format!("Invalid MODEL_ID '{model_id}': expected <org>/<repo>").into());
    }
    Ok(())
}

/// An explicit model path must not point at a directory.
///
/// A missing file is not a configuration error: the server starts without
/// a model and reports it through `/health`.
pub(super) fn validate_model_path(
    model_path: &Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match model_path {
        Some(path) if path.is_dir() => Err(format!(
            "MODEL_PATH {} is a directory; use MODEL_DIR to scan a directory",
            path.display()
        )
        .into()),
        Some(path) if !path.exists() => {
            tracing::warn!("MODEL_PATH {} does not exist yet", path.display());
            Ok(())
        }
        _ => Ok(()),
    }
}

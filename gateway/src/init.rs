//! Initialization helpers for preparing the model cache before starting the
//! gateway.
//!
//! This module hosts the logic that powers the `gguf-tts-gateway init` CLI
//! command. The command locates the GGUF model and converts it into the hub
//! cache so that regular server startups skip the slow conversion step.
//!
//! Typical usage from the CLI:
//!
//! ```text
//! $ MODEL_DIR=/models CACHE_PATH=/app/cache gguf-tts-gateway init
//! ```
//!
//! If you prefer to invoke the initialization routine programmatically, call
//! [`run`] inside an async context:
//!
//! ```rust,no_run
//! use gguf_tts_gateway::{ServerConfig, init};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let config = ServerConfig::from_env().unwrap();
//!     init::run(config).await.expect("failed to prepare model");
//! });
//! ```

use anyhow::{Context, Result, anyhow};

use crate::config::ServerConfig;
use crate::core::model::{Capabilities, ConvertedModel, LoadConfig, ModelLoadState};

/// Locate the model and make sure its converted weights are cached.
pub async fn run(config: ServerConfig) -> Result<ConvertedModel> {
    prepare(config, Capabilities::builtin()).await
}

/// Same as [`run`] with an explicit converter/engine set
pub async fn prepare(config: ServerConfig, capabilities: Capabilities) -> Result<ConvertedModel> {
    if !capabilities.conversion_available() {
        return Err(anyhow!(
            "`init` requires a model converter. Rebuild with the `gguf` feature enabled."
        ));
    }

    let load_config =
        LoadConfig::from_server_config(&config).context("Failed to select compute device")?;

    tracing::info!(
        "Preparing converted model in cache path: {}",
        load_config.cache_dir.display()
    );

    let models = ModelLoadState::new(load_config, capabilities);
    let (artifact, converted) = models
        .prepare()
        .await
        .map_err(|e| anyhow!("Failed to prepare model: {}", e.reason()))?;

    tracing::info!(
        "Model {} ready at {}",
        artifact.file_name(),
        converted.path().display()
    );

    Ok(converted)
}

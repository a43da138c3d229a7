use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::model::device::DeviceError;
use crate::core::model::{Capabilities, LoadConfig, ModelLoadState};

/// Shared application state
///
/// Handlers receive this through axum's `State` extractor. The model
/// lifecycle is owned here; handlers only read its snapshots.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub models: Arc<ModelLoadState>,
}

impl AppState {
    /// Build state with the components compiled into this binary
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, DeviceError> {
        Self::with_capabilities(config, Capabilities::builtin()).await
    }

    /// Build state with explicitly injected converter and engine
    pub async fn with_capabilities(
        config: ServerConfig,
        capabilities: Capabilities,
    ) -> Result<Arc<Self>, DeviceError> {
        let load_config = LoadConfig::from_server_config(&config)?;

        tracing::info!(
            device = %load_config.device,
            precision = %load_config.precision,
            cache = %load_config.cache_dir.display(),
            ?capabilities,
            "Initialized model state"
        );

        Ok(Arc::new(Self {
            config,
            models: Arc::new(ModelLoadState::new(load_config, capabilities)),
        }))
    }
}

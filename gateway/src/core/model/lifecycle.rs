//! Model lifecycle management
//!
//! The model moves through a one-directional sequence:
//!
//! ```text
//! Unloaded → Converting → Loading → Ready
//!      \          \           \
//!       \          +-----------+--→ Failed(reason)
//!        +--(missing engine)------→ Failed(reason)
//! ```
//!
//! `Failed` is terminal until an explicit [`ModelLoadState::reload`]. Readers
//! never block: every transition publishes a new immutable [`LoadSnapshot`]
//! that request handlers load without locking. At most one load sequence runs
//! at a time; a second attempt is rejected with [`LoadError::InProgress`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::artifact::{self, LocateError, ModelArtifact};
use super::capabilities::{Capabilities, MISSING_ENGINE_DETAIL};
use super::converter::{ConvertError, ConvertedModel};
use super::device::{ComputeDevice, DeviceError, Precision};
use super::engine::{EngineError, LoadRequest, ModelBundle, SpeechEngine};
use super::join_error_message;
use super::session::{InferenceSession, SessionConfig};
use crate::config::ServerConfig;

/// Lifecycle state of the served model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No load has completed yet
    Unloaded,
    /// The GGUF artifact is being converted (or found in the cache)
    Converting,
    /// The engine is loading converted weights
    Loading,
    /// A session is available for generation
    Ready,
    /// The last load sequence failed; requires a reload
    Failed(String),
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Converting => "converting",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether a load sequence is currently between its first and last step
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Converting | Self::Loading)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Immutable view of the lifecycle published after every transition.
///
/// A session is present exactly when the state is `Ready`.
#[derive(Debug, Clone)]
pub struct LoadSnapshot {
    state: LoadState,
    artifact: Option<Arc<ModelArtifact>>,
    session: Option<Arc<InferenceSession>>,
    last_error: Option<String>,
}

impl LoadSnapshot {
    fn unloaded() -> Self {
        Self {
            state: LoadState::Unloaded,
            artifact: None,
            session: None,
            last_error: None,
        }
    }

    fn not_found(reason: String) -> Self {
        Self {
            last_error: Some(reason),
            ..Self::unloaded()
        }
    }

    fn in_progress(state: LoadState, artifact: Arc<ModelArtifact>) -> Self {
        debug_assert!(state.is_in_progress());
        Self {
            state,
            artifact: Some(artifact),
            session: None,
            last_error: None,
        }
    }

    fn ready(artifact: Arc<ModelArtifact>, session: Arc<InferenceSession>) -> Self {
        Self {
            state: LoadState::Ready,
            artifact: Some(artifact),
            session: Some(session),
            last_error: None,
        }
    }

    fn failed(artifact: Arc<ModelArtifact>, reason: String) -> Self {
        Self {
            state: LoadState::Failed(reason.clone()),
            artifact: Some(artifact),
            session: None,
            last_error: Some(reason),
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn artifact(&self) -> Option<&Arc<ModelArtifact>> {
        self.artifact.as_ref()
    }

    pub fn session(&self) -> Option<&Arc<InferenceSession>> {
        self.session.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    NotFound(#[from] LocateError),

    #[error("{0}")]
    DependencyMissing(String),

    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error(transparent)]
    Load(#[from] EngineError),

    #[error("A model load is already in progress")]
    InProgress,

    #[error("Model load failed ({0}); trigger a reload to retry")]
    Terminal(String),

    #[error("Cannot start a load sequence from the {0} state")]
    InvalidTransition(&'static str),

    #[error("Model discovery task failed: {0}")]
    Task(String),
}

impl LoadError {
    /// Reason string recorded in the snapshot, prefixed with the error kind
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound(e) => format!("not_found: {e}"),
            Self::DependencyMissing(detail) => format!("dependency_missing: {detail}"),
            Self::Conversion(e) => format!("conversion_error: {e}"),
            Self::Load(e) => format!("load_error: {e}"),
            Self::Task(detail) => format!("not_found: {detail}"),
            other => other.to_string(),
        }
    }
}

/// Where the model comes from and how it is loaded
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Explicit GGUF file; skips directory scanning when set
    pub model_path: Option<PathBuf>,
    /// Directory scanned for GGUF files
    pub model_dir: PathBuf,
    /// Hub model identifier the converted weights are published under
    pub model_id: String,
    /// Root of the hub cache
    pub cache_dir: PathBuf,
    pub device: ComputeDevice,
    pub precision: Precision,
    pub generation_timeout: Option<Duration>,
}

impl LoadConfig {
    /// Resolve paths and probe the compute device from server configuration
    pub fn from_server_config(config: &ServerConfig) -> Result<Self, DeviceError> {
        let device = ComputeDevice::select(config.device)?;
        let precision = Precision::resolve(config.precision, device);

        Ok(Self {
            model_path: config.model_path.clone(),
            model_dir: config.resolved_model_dir(),
            model_id: config.model_id.clone(),
            cache_dir: config.resolved_cache_path(),
            device,
            precision,
            generation_timeout: config.generation_timeout(),
        })
    }
}

/// Owner of the lifecycle state machine
pub struct ModelLoadState {
    config: LoadConfig,
    capabilities: Capabilities,
    snapshot: ArcSwap<LoadSnapshot>,
    in_flight: Arc<Mutex<()>>,
}

impl ModelLoadState {
    pub fn new(config: LoadConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            snapshot: ArcSwap::from_pointee(LoadSnapshot::unloaded()),
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Current snapshot; never blocks
    pub fn snapshot(&self) -> Arc<LoadSnapshot> {
        self.snapshot.load_full()
    }

    pub fn state(&self) -> LoadState {
        self.snapshot.load().state.clone()
    }

    /// Session of the loaded model, if the state is `Ready`
    pub fn session(&self) -> Option<Arc<InferenceSession>> {
        self.snapshot.load().session.clone()
    }

    /// Whether a load sequence currently holds the in-flight slot
    pub fn is_loading(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Locate, convert and load the model.
    ///
    /// Returns the existing session when already `Ready` and refuses to run
    /// from `Failed`.
    pub async fn load(&self) -> Result<Arc<InferenceSession>, LoadError> {
        let guard = self.acquire()?;
        self.load_locked(guard).await
    }

    /// Reset to `Unloaded` and run the full load sequence again
    pub async fn reload(&self) -> Result<Arc<InferenceSession>, LoadError> {
        let guard = self.acquire()?;
        self.reload_locked(guard).await
    }

    /// Run [`Self::load`] in the background.
    ///
    /// The in-flight slot is claimed before this returns, so a concurrent
    /// load or reload observes [`LoadError::InProgress`] immediately.
    pub fn spawn_load(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<Arc<InferenceSession>, LoadError>>, LoadError> {
        let guard = self.acquire()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.load_locked(guard).await }))
    }

    /// Run [`Self::reload`] in the background
    pub fn spawn_reload(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<Arc<InferenceSession>, LoadError>>, LoadError> {
        let guard = self.acquire()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.reload_locked(guard).await }))
    }

    /// Drive a located artifact through conversion and loading.
    ///
    /// Only valid from `Unloaded`.
    pub async fn advance_load(
        &self,
        artifact: ModelArtifact,
    ) -> Result<Arc<InferenceSession>, LoadError> {
        let _guard = self.acquire()?;
        match self.snapshot().state() {
            LoadState::Unloaded => {}
            LoadState::Failed(reason) => return Err(LoadError::Terminal(reason.clone())),
            other => return Err(LoadError::InvalidTransition(other.as_str())),
        }
        self.advance(Arc::new(artifact)).await
    }

    /// Locate the artifact and make sure its converted weights are cached,
    /// without loading the model or touching the published state
    pub async fn prepare(&self) -> Result<(ModelArtifact, ConvertedModel), LoadError> {
        let _guard = self.acquire()?;
        let artifact = self.locate().await?;
        let converted = self.converted_model(&artifact);
        if converted.exists() {
            info!("Converted model already cached at {}", converted.path().display());
        } else {
            self.convert(&artifact, &converted).await?;
        }
        Ok((artifact, converted))
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, LoadError> {
        Arc::clone(&self.in_flight)
            .try_lock_owned()
            .map_err(|_| LoadError::InProgress)
    }

    async fn load_locked(
        &self,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<Arc<InferenceSession>, LoadError> {
        let current = self.snapshot();
        match current.state() {
            LoadState::Ready => {
                if let Some(session) = current.session() {
                    return Ok(Arc::clone(session));
                }
            }
            LoadState::Failed(reason) => return Err(LoadError::Terminal(reason.clone())),
            _ => {}
        }
        self.run_sequence().await
    }

    async fn reload_locked(
        &self,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<Arc<InferenceSession>, LoadError> {
        info!(from = %self.state(), "Reloading model");
        self.publish(LoadSnapshot::unloaded());
        self.run_sequence().await
    }

    async fn run_sequence(&self) -> Result<Arc<InferenceSession>, LoadError> {
        let artifact = match self.locate().await {
            Ok(artifact) => artifact,
            Err(e) => {
                let reason = e.reason();
                warn!("No model loaded: {}", reason);
                self.publish(LoadSnapshot::not_found(reason));
                return Err(e);
            }
        };
        self.advance(Arc::new(artifact)).await
    }

    async fn locate(&self) -> Result<ModelArtifact, LoadError> {
        let explicit = self.config.model_path.clone();
        let scan_dir = self.config.model_dir.clone();
        tokio::task::spawn_blocking(move || artifact::locate(explicit.as_deref(), &scan_dir))
            .await
            .map_err(|e| LoadError::Task(join_error_message("model discovery", e)))?
            .map_err(LoadError::from)
    }

    fn converted_model(&self, artifact: &ModelArtifact) -> ConvertedModel {
        ConvertedModel::locate(&self.config.cache_dir, &self.config.model_id, artifact)
    }

    async fn advance(
        &self,
        artifact: Arc<ModelArtifact>,
    ) -> Result<Arc<InferenceSession>, LoadError> {
        let Some(engine) = self.capabilities.engine().cloned() else {
            return Err(self.fail(
                &artifact,
                LoadError::DependencyMissing(MISSING_ENGINE_DETAIL.to_string()),
            ));
        };

        let started = Instant::now();
        let converted = self.converted_model(&artifact);

        self.publish(LoadSnapshot::in_progress(
            LoadState::Converting,
            Arc::clone(&artifact),
        ));
        if converted.exists() {
            info!(
                "Converted model already cached at {}, skipping conversion",
                converted.path().display()
            );
        } else if let Err(e) = self.convert(&artifact, &converted).await {
            return Err(self.fail(&artifact, e));
        }

        self.publish(LoadSnapshot::in_progress(
            LoadState::Loading,
            Arc::clone(&artifact),
        ));
        let bundle = match self.load_bundle(engine, &converted).await {
            Ok(bundle) => bundle,
            Err(e) => return Err(self.fail(&artifact, e)),
        };

        let session = Arc::new(InferenceSession::new(
            bundle,
            Arc::clone(&artifact),
            SessionConfig {
                model_id: self.config.model_id.clone(),
                device: self.config.device,
                precision: self.config.precision,
                generation_timeout: self.config.generation_timeout,
            },
        ));
        self.publish(LoadSnapshot::ready(artifact, Arc::clone(&session)));

        info!(
            device = %self.config.device,
            precision = %self.config.precision,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model ready"
        );
        Ok(session)
    }

    async fn convert(
        &self,
        artifact: &ModelArtifact,
        converted: &ConvertedModel,
    ) -> Result<(), LoadError> {
        let Some(converter) = self.capabilities.converter().cloned() else {
            return Err(ConvertError::Unavailable.into());
        };

        info!(
            converter = converter.name(),
            "Converting {} to {}",
            artifact.path().display(),
            converted.path().display()
        );

        let source = artifact.path().to_path_buf();
        let destination = converted.clone();
        let precision = self.config.precision;
        tokio::task::spawn_blocking(move || {
            destination.materialize(converter.as_ref(), &source, precision)
        })
        .await
        .map_err(|e| ConvertError::Other(join_error_message("model conversion", e)))??;

        Ok(())
    }

    async fn load_bundle(
        &self,
        engine: Arc<dyn SpeechEngine>,
        converted: &ConvertedModel,
    ) -> Result<ModelBundle, LoadError> {
        info!(
            engine = engine.name(),
            device = %self.config.device,
            precision = %self.config.precision,
            "Loading model from {}",
            converted.directory().display()
        );

        let model_id = self.config.model_id.clone();
        let weights_dir = converted.directory().to_path_buf();
        let device = self.config.device;
        let precision = self.config.precision;
        let bundle = tokio::task::spawn_blocking(move || {
            engine.load(&LoadRequest {
                model_id: &model_id,
                weights_dir: &weights_dir,
                device,
                precision,
            })
        })
        .await
        .map_err(|e| EngineError::new(join_error_message("model loading", e)))??;

        Ok(bundle)
    }

    fn fail(&self, artifact: &Arc<ModelArtifact>, error: LoadError) -> LoadError {
        let reason = error.reason();
        error!("Model load failed: {}", reason);
        self.publish(LoadSnapshot::failed(Arc::clone(artifact), reason));
        error
    }

    fn publish(&self, next: LoadSnapshot) {
        let previous = self.snapshot.swap(Arc::new(next));
        let current = self.snapshot.load();
        if previous.state != current.state {
            debug!(from = %previous.state, to = %current.state, "Model state transition");
        }
    }
}

impl fmt::Debug for ModelLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLoadState")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state())
            .finish()
    }
}

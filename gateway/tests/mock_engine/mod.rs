//! Mock converter and speech engine for integration tests
//!
//! The mocks record how often they are invoked, can be told to fail, and can
//! be held at a gate so tests observe the `Converting` and `Loading` states.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

use gguf_tts_gateway::ServerConfig;
use gguf_tts_gateway::core::model::{
    Capabilities, ConvertError, DevicePreference, EncodedText, EngineError, GenerationOptions,
    GenerationOutput, LoadRequest, LoadState, ModelBundle, ModelConverter, ModelLoadState,
    Precision, PrecisionPreference, SpeechEngine, SpeechModel, SpeechProcessor,
};
use gguf_tts_gateway::state::AppState;

pub const SAMPLE_RATE: u32 = 24_000;

// ─────────────────────────────────────────────────────────────────────────────
// Gate
// ─────────────────────────────────────────────────────────────────────────────

/// Blocks a worker thread until released
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Converter
// ─────────────────────────────────────────────────────────────────────────────

/// Writes a tiny valid safetensors file instead of dequantizing
#[derive(Default)]
pub struct MockConverter {
    pub calls: AtomicUsize,
    /// Fail this many calls before succeeding
    pub failures_remaining: AtomicUsize,
    pub gate: Option<Arc<Gate>>,
    pub last_precision: Mutex<Option<Precision>>,
}

impl MockConverter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_remaining: AtomicUsize::new(times),
            ..Self::default()
        })
    }

    pub fn gated(gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn write_minimal_safetensors(path: &Path) -> std::io::Result<()> {
    let header = br#"{"speech.weight":{"dtype":"F32","shape":[2],"data_offsets":[0,8]}}"#;
    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header);
    bytes.extend_from_slice(&[0u8; 8]);
    std::fs::write(path, bytes)
}

impl ModelConverter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    fn convert(
        &self,
        _source: &Path,
        destination: &Path,
        precision: Precision,
    ) -> Result<(), ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_precision.lock().unwrap() = Some(precision);

        if let Some(gate) = &self.gate {
            gate.wait();
        }

        write_minimal_safetensors(destination).map_err(|e| ConvertError::io(destination, e))?;

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConvertError::Other("corrupt GGUF tensor block".to_string()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Counters shared by every model the engine hands out
#[derive(Default)]
pub struct ModelStats {
    pub generate_calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ModelStats {
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedLoad {
    pub model_id: String,
    pub weights_dir: PathBuf,
    pub device: String,
    pub precision: Precision,
}

pub struct MockEngine {
    pub loads: AtomicUsize,
    pub load_error: Option<String>,
    pub gate: Option<Arc<Gate>>,
    pub generation_delay: Duration,
    pub generation_error: Option<String>,
    pub samples: usize,
    pub stats: Arc<ModelStats>,
    pub last_load: Mutex<Option<RecordedLoad>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            load_error: None,
            gate: None,
            generation_delay: Duration::ZERO,
            generation_error: None,
            samples: 2_400,
            stats: Arc::new(ModelStats::default()),
            last_load: Mutex::new(None),
        }
    }
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl SpeechEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn load(&self, request: &LoadRequest<'_>) -> Result<ModelBundle, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_load.lock().unwrap() = Some(RecordedLoad {
            model_id: request.model_id.to_string(),
            weights_dir: request.weights_dir.to_path_buf(),
            device: request.device.kind().to_string(),
            precision: request.precision,
        });

        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if let Some(message) = &self.load_error {
            return Err(EngineError::new(message.clone()));
        }
        if !request.weights_dir.join("model.safetensors").is_file() {
            return Err(EngineError::new("model.safetensors missing"));
        }

        Ok(ModelBundle {
            model: Box::new(MockModel {
                stats: Arc::clone(&self.stats),
                delay: self.generation_delay,
                error: self.generation_error.clone(),
                samples: self.samples,
            }),
            processor: Arc::new(MockProcessor),
        })
    }
}

pub struct MockProcessor;

impl SpeechProcessor for MockProcessor {
    fn encode(&self, text: &str) -> Result<EncodedText, EngineError> {
        Ok(EncodedText {
            token_ids: text.chars().map(u32::from).collect(),
        })
    }

    fn sampling_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

pub struct MockModel {
    stats: Arc<ModelStats>,
    delay: Duration,
    error: Option<String>,
    samples: usize,
}

impl SpeechModel for MockModel {
    fn generate(
        &mut self,
        inputs: &EncodedText,
        _options: &GenerationOptions,
    ) -> Result<GenerationOutput, EngineError> {
        self.stats.generate_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);

        std::thread::sleep(self.delay);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = &self.error {
            return Err(EngineError::new(message.clone()));
        }
        let amplitude = (inputs.token_ids.len() % 10) as f32 / 20.0;
        Ok(GenerationOutput {
            speech_outputs: vec![vec![amplitude; self.samples]],
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Environment helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Temporary model directory and hub cache
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        Self { dir }
    }

    pub fn model_dir(&self) -> PathBuf {
        self.dir.path().join("models")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    pub fn write_model(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.model_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn config(&self) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            model_dir: Some(self.model_dir()),
            cache_path: Some(self.cache_dir()),
            device: DevicePreference::Cpu,
            precision: PrecisionPreference::F32,
            ..ServerConfig::default()
        }
    }

    /// Every converted `model.safetensors` currently in the cache
    pub fn converted_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(&self.cache_dir(), &mut found);
        found
            .into_iter()
            .filter(|path| path.file_name().is_some_and(|n| n == "model.safetensors"))
            .collect()
    }

    /// Every file in the cache, including partial outputs
    pub fn cache_files(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_files(&self.cache_dir(), &mut found);
        found
    }
}

fn collect_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, found);
        } else {
            found.push(path);
        }
    }
}

pub fn capabilities(converter: &Arc<MockConverter>, engine: &Arc<MockEngine>) -> Capabilities {
    Capabilities::new()
        .with_converter(converter.clone())
        .with_engine(engine.clone())
}

pub async fn build_state(config: ServerConfig, capabilities: Capabilities) -> Arc<AppState> {
    AppState::with_capabilities(config, capabilities)
        .await
        .expect("cpu device is always available")
}

/// Poll until the lifecycle reaches a state matching `predicate`
pub async fn wait_for_state(
    models: &ModelLoadState,
    predicate: impl Fn(&LoadState) -> bool,
) -> LoadState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let state = models.state();
        if predicate(&state) {
            return state;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for model state, last state: {state}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP helpers
// ─────────────────────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn detail(&self) -> String {
        self.json()["detail"].as_str().unwrap_or_default().to_string()
    }
}

fn header_value(headers: &axum::http::HeaderMap, name: axum::http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let content_type = header_value(&parts.headers, axum::http::header::CONTENT_TYPE);
    let content_disposition =
        header_value(&parts.headers, axum::http::header::CONTENT_DISPOSITION);
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap()
        .to_vec();

    TestResponse {
        status: parts.status,
        content_type,
        content_disposition,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_raw(app: &Router, uri: &str, body: &'static str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

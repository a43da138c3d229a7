//! Inference session: a loaded model ready to synthesize speech

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::artifact::ModelArtifact;
use super::device::{ComputeDevice, Precision};
use super::engine::{GenerationOptions, ModelBundle, SpeechModel, SpeechProcessor};
use super::{join_error_message, wav};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Input text cannot be empty")]
    EmptyInput,

    #[error("Speech generation exceeded the {}s time limit", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("Failed to encode WAV audio: {0}")]
    Audio(#[from] hound::Error),
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::Timeout(_) => "timeout",
            Self::Failed(_) => "generation_failed",
            Self::Audio(_) => "audio_encoding",
        }
    }
}

/// Generated speech as a WAV file
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    pub audio: Bytes,
    pub sample_rate: u32,
    pub samples: usize,
}

impl SynthesizedSpeech {
    pub fn media_type(&self) -> &'static str {
        wav::WAV_MEDIA_TYPE
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.samples as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }
}

/// Settings fixed for the lifetime of a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model_id: String,
    pub device: ComputeDevice,
    pub precision: Precision,
    /// Per-request generation limit, unlimited when unset
    pub generation_timeout: Option<Duration>,
}

/// A loaded model/processor pair.
///
/// Generation calls are serialized: one request at a time drives the model,
/// others wait their turn in arrival order.
pub struct InferenceSession {
    model: Arc<Mutex<Box<dyn SpeechModel>>>,
    processor: Arc<dyn SpeechProcessor>,
    artifact: Arc<ModelArtifact>,
    config: SessionConfig,
}

impl InferenceSession {
    pub fn new(bundle: ModelBundle, artifact: Arc<ModelArtifact>, config: SessionConfig) -> Self {
        Self {
            model: Arc::new(Mutex::new(bundle.model)),
            processor: bundle.processor,
            artifact,
            config,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.config.model_id
    }

    pub fn device(&self) -> ComputeDevice {
        self.config.device
    }

    pub fn precision(&self) -> Precision {
        self.config.precision
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn sampling_rate(&self) -> u32 {
        self.processor.sampling_rate()
    }

    /// Synthesize `text` with the session's configured time limit
    pub async fn synthesize(
        &self,
        text: &str,
        cfg_scale: f32,
    ) -> Result<SynthesizedSpeech, GenerationError> {
        self.synthesize_with_timeout(text, cfg_scale, self.config.generation_timeout)
            .await
    }

    /// Synthesize `text` into a 16-bit PCM mono WAV file.
    ///
    /// Whitespace-only input is rejected before the model is touched. When a
    /// timeout is given, the deadline is also passed to the model so it can
    /// stop early; the request fails with [`GenerationError::Timeout`] either
    /// way.
    pub async fn synthesize_with_timeout(
        &self,
        text: &str,
        cfg_scale: f32,
        timeout: Option<Duration>,
    ) -> Result<SynthesizedSpeech, GenerationError> {
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyInput);
        }

        let started = Instant::now();
        let options = GenerationOptions {
            cfg_scale,
            max_new_tokens: None,
            deadline: timeout.and_then(|limit| started.checked_add(limit)),
        };

        let model = Arc::clone(&self.model);
        let processor = Arc::clone(&self.processor);
        let text = text.to_owned();
        let work = async move {
            let guard = model.lock_owned().await;
            debug!(waited_ms = started.elapsed().as_millis() as u64, "Acquired model");
            tokio::task::spawn_blocking(move || run_generation(guard, processor.as_ref(), &text, &options))
                .await
                .map_err(|e| GenerationError::Failed(join_error_message("speech generation", e)))?
        };

        let speech = match timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => work.await?,
        };

        info!(
            samples = speech.samples,
            sample_rate = speech.sample_rate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Speech generated"
        );
        Ok(speech)
    }
}

impl fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceSession")
            .field("model_id", &self.config.model_id)
            .field("device", &self.config.device)
            .field("precision", &self.config.precision)
            .field("artifact", &self.artifact)
            .finish()
    }
}

fn run_generation(
    mut model: OwnedMutexGuard<Box<dyn SpeechModel>>,
    processor: &dyn SpeechProcessor,
    text: &str,
    options: &GenerationOptions,
) -> Result<SynthesizedSpeech, GenerationError> {
    let inputs = processor
        .encode(text)
        .map_err(|e| GenerationError::Failed(format!("Failed to encode input text: {e}")))?;
    let output = model
        .generate(&inputs, options)
        .map_err(|e| GenerationError::Failed(e.to_string()))?;
    drop(model);

    let samples = output
        .speech_outputs
        .into_iter()
        .next()
        .filter(|samples| !samples.is_empty())
        .ok_or_else(|| GenerationError::Failed("Model produced no audio".to_string()))?;

    let sample_rate = processor.sampling_rate();
    let audio = wav::encode_wav(&samples, sample_rate)?;

    Ok(SynthesizedSpeech {
        audio: Bytes::from(audio),
        sample_rate,
        samples: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::engine::{EncodedText, EngineError, GenerationOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor;

    impl SpeechProcessor for CountingProcessor {
        fn encode(&self, text: &str) -> Result<EncodedText, EngineError> {
            Ok(EncodedText {
                token_ids: text.bytes().map(u32::from).collect(),
            })
        }

        fn sampling_rate(&self) -> u32 {
            24_000
        }
    }

    struct ToneModel {
        calls: Arc<AtomicUsize>,
        delay: Duration,
        output: Result<Vec<f32>, String>,
    }

    impl SpeechModel for ToneModel {
        fn generate(
            &mut self,
            inputs: &EncodedText,
            _options: &GenerationOptions,
        ) -> Result<GenerationOutput, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!inputs.token_ids.is_empty());
            std::thread::sleep(self.delay);
            match &self.output {
                Ok(samples) => Ok(GenerationOutput {
                    speech_outputs: vec![samples.clone()],
                }),
                Err(message) => Err(EngineError::new(message.clone())),
            }
        }
    }

    fn session(model: ToneModel, timeout: Option<Duration>) -> InferenceSession {
        InferenceSession::new(
            ModelBundle {
                model: Box::new(model),
                processor: Arc::new(CountingProcessor),
            },
            Arc::new(ModelArtifact::from_parts("model.gguf", "00".repeat(32))),
            SessionConfig {
                model_id: "org/model".to_string(),
                device: ComputeDevice::Cpu,
                precision: Precision::F32,
                generation_timeout: timeout,
            },
        )
    }

    fn tone(calls: &Arc<AtomicUsize>) -> ToneModel {
        ToneModel {
            calls: Arc::clone(calls),
            delay: Duration::ZERO,
            output: Ok(vec![0.25; 480]),
        }
    }

    #[tokio::test]
    async fn test_synthesize_produces_wav() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = session(tone(&calls), None);

        let speech = session.synthesize("Hello world", 1.3).await.unwrap();
        assert_eq!(&speech.audio[..4], b"RIFF");
        assert_eq!(speech.sample_rate, 24_000);
        assert_eq!(speech.samples, 480);
        assert_eq!(speech.media_type(), "audio/wav");
        assert_eq!(speech.duration(), Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_never_reaches_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = session(tone(&calls), None);

        for input in ["", "   ", "\n\t"] {
            let err = session.synthesize(input, 1.0).await.unwrap_err();
            assert!(matches!(err, GenerationError::EmptyInput));
            assert_eq!(err.kind(), "empty_input");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_error_is_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = tone(&calls);
        model.output = Err("CUDA out of memory".to_string());
        let session = session(model, None);

        let err = session.synthesize("Hello", 1.0).await.unwrap_err();
        assert_eq!(err.kind(), "generation_failed");
        assert!(err.to_string().contains("CUDA out of memory"));
    }

    #[tokio::test]
    async fn test_empty_output_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = tone(&calls);
        model.output = Ok(Vec::new());
        let session = session(model, None);

        let err = session.synthesize("Hello", 1.0).await.unwrap_err();
        assert!(err.to_string().contains("no audio"));
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = tone(&calls);
        model.delay = Duration::from_millis(500);
        let session = session(model, Some(Duration::from_millis(50)));

        let err = session.synthesize("Hello", 1.0).await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = session(tone(&calls), Some(Duration::from_secs(u64::MAX)));

        let speech = session.synthesize("Hello", 1.0).await.unwrap();
        assert_eq!(speech.samples, 480);
    }

    #[test]
    fn test_debug_names_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let rendered = format!("{:?}", session(tone(&calls), None));
        assert!(rendered.contains("org/model"), "{rendered}");
        assert!(rendered.contains("Cpu"), "{rendered}");
    }
}

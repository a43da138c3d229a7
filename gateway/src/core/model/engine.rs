//! Speech engine seam
//!
//! The neural speech pipeline (tokenizer, language model, diffusion head and
//! acoustic decoder) lives outside the gateway. An engine turns a converted
//! weights directory into a model/processor pair; the gateway only drives
//! that pair through encode → generate.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use super::device::{ComputeDevice, Precision};

/// Error reported by an engine, processor or model
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything an engine needs to load a model
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Hub model identifier the converted weights are published under
    pub model_id: &'a str,
    /// Snapshot directory containing `model.safetensors`
    pub weights_dir: &'a Path,
    pub device: ComputeDevice,
    pub precision: Precision,
}

/// Processor output for one text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedText {
    pub token_ids: Vec<u32>,
}

/// Knobs passed to a single generation call
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    /// Classifier-free guidance scale
    pub cfg_scale: f32,
    /// Upper bound on generated tokens, engine default when unset
    pub max_new_tokens: Option<usize>,
    /// Point in time after which the engine should stop early
    pub deadline: Option<Instant>,
}

impl GenerationOptions {
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Raw generation result
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    /// One waveform per input, mono samples in [-1.0, 1.0]
    pub speech_outputs: Vec<Vec<f32>>,
}

pub trait SpeechProcessor: Send + Sync {
    fn encode(&self, text: &str) -> Result<EncodedText, EngineError>;

    /// Output sample rate in Hz
    fn sampling_rate(&self) -> u32;
}

pub trait SpeechModel: Send {
    fn generate(
        &mut self,
        inputs: &EncodedText,
        options: &GenerationOptions,
    ) -> Result<GenerationOutput, EngineError>;
}

/// A loaded model and the processor that feeds it
pub struct ModelBundle {
    pub model: Box<dyn SpeechModel>,
    pub processor: Arc<dyn SpeechProcessor>,
}

/// Loads speech models from converted weights
pub trait SpeechEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Load the model; may block for a long time
    fn load(&self, request: &LoadRequest<'_>) -> Result<ModelBundle, EngineError>;
}

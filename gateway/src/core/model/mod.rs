//! Local GGUF speech model: discovery, conversion, loading and inference

pub mod artifact;
pub mod capabilities;
pub mod converter;
pub mod device;
pub mod engine;
pub mod lifecycle;
pub mod safetensors;
pub mod session;
pub mod wav;

pub use artifact::{LocateError, ModelArtifact, locate};
pub use capabilities::{Capabilities, MISSING_ENGINE_DETAIL};
#[cfg(feature = "gguf")]
pub use converter::GgufConverter;
pub use converter::{ConvertError, ConvertedModel, ModelConverter};
pub use device::{ComputeDevice, DevicePreference, Precision, PrecisionPreference};
pub use engine::{
    EncodedText, EngineError, GenerationOptions, GenerationOutput, LoadRequest, ModelBundle,
    SpeechEngine, SpeechModel, SpeechProcessor,
};
pub use lifecycle::{LoadConfig, LoadError, LoadSnapshot, LoadState, ModelLoadState};
pub use session::{GenerationError, InferenceSession, SessionConfig, SynthesizedSpeech};

/// Describe a failed blocking task, including the panic payload if any
pub(crate) fn join_error_message(task: &str, error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return format!("{task} task was cancelled");
    }

    let payload = error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("{task} panicked: {detail}")
}

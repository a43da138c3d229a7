pub mod model;
pub mod speech;

pub use model::{
    Capabilities, ComputeDevice, GenerationError, InferenceSession, LoadError, LoadSnapshot,
    LoadState, ModelArtifact, ModelLoadState, Precision, SpeechEngine, SpeechModel,
    SpeechProcessor,
};
pub use speech::{AudioOutputFormat, SpeechRequest};

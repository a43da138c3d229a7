//! OpenAI-compatible speech request types

pub mod format;
pub mod request;

pub use format::AudioOutputFormat;
pub use request::{DEFAULT_MODEL, DEFAULT_VOICE, SpeechRequest};

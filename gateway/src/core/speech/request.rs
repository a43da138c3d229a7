use serde::{Deserialize, Serialize};

use super::format::AudioOutputFormat;

pub const DEFAULT_MODEL: &str = "vibevoice";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_SPEED: f32 = 1.0;
pub const DEFAULT_RESPONSE_FORMAT: &str = "mp3";

/// Range `speed` is clamped to when clamping is enabled
pub const SPEED_RANGE: (f32, f32) = (0.25, 4.0);

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

fn default_response_format() -> String {
    DEFAULT_RESPONSE_FORMAT.to_string()
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

/// Body of `POST /v1/audio/speech`.
///
/// `model` and `voice` are accepted for compatibility with OpenAI clients
/// and only logged; the server always speaks with the loaded model.
/// `response_format` takes any string and the reply is always WAV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub input: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_response_format")]
    pub response_format: String,
    /// Used as the classifier-free guidance scale
    #[serde(default = "default_speed")]
    pub speed: f32,
}

impl SpeechRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            model: default_model(),
            input: input.into(),
            voice: default_voice(),
            response_format: default_response_format(),
            speed: DEFAULT_SPEED,
        }
    }

    /// Recognized output format, if the requested value names one
    pub fn output_format(&self) -> Option<AudioOutputFormat> {
        AudioOutputFormat::recognize(&self.response_format)
    }

    /// Guidance scale passed to the model
    pub fn cfg_scale(&self, clamp: bool) -> f32 {
        if clamp {
            self.speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1)
        } else {
            self.speed
        }
    }
}

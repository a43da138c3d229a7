//! Output format negotiation for the speech endpoint.
//!
//! Requests may name any `response_format`; the server always produces WAV.
//! The requested value is only classified so the handler can log when a
//! client asked for something else.

/// Audio formats OpenAI clients commonly request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutputFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    /// Raw 16-bit little-endian PCM
    Pcm,
}

impl AudioOutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
        }
    }

    /// Whether the server returns this format as requested
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Wav)
    }

    /// Classify a `response_format` value, ignoring case and surrounding
    /// whitespace. Unrecognized values yield `None`.
    pub fn recognize(value: &str) -> Option<Self> {
        let format = match value.trim().to_ascii_lowercase().as_str() {
            "mp3" => Self::Mp3,
            "opus" => Self::Opus,
            "aac" => Self::Aac,
            "flac" => Self::Flac,
            "wav" | "wave" => Self::Wav,
            "pcm" => Self::Pcm,
            _ => return None,
        };
        Some(format)
    }
}

impl std::fmt::Display for AudioOutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! WAV serialization for generated speech

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub const WAV_MEDIA_TYPE: &str = "audio/wav";

/// 16-bit PCM mono at `sample_rate`
pub fn pcm16_mono(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Encode samples as WAV bytes using a scratch file in the system temp dir
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> hound::Result<Vec<u8>> {
    encode_wav_in(&std::env::temp_dir(), samples, sample_rate)
}

/// Encode samples as WAV bytes using a scratch file in `dir`.
///
/// The scratch file is removed when this returns, on success and on error.
pub fn encode_wav_in(dir: &Path, samples: &[f32], sample_rate: u32) -> hound::Result<Vec<u8>> {
    let scratch = tempfile::Builder::new()
        .prefix("speech-")
        .suffix(".wav")
        .tempfile_in(dir)?;

    let mut writer = WavWriter::create(scratch.path(), pcm16_mono(sample_rate))?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()?;

    Ok(std::fs::read(scratch.path())?)
}

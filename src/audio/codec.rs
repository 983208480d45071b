//! PCM wire-format decoding and validation.
//!
//! The capture client ships audio as base64-encoded little-endian float32
//! mono ("f32_mono"). Decoding is a pure function: no state, no retained
//! bytes; the decoded samples live only for the duration of one
//! /audio_chunk call.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{EngineError, Result};

/// Tolerance applied to the [-1.0, 1.0] range check.
const RANGE_EPSILON: f32 = 1e-6;

/// Decoded mono samples plus the duration they represent at the capture rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    /// Seconds of audio at the declared capture rate (never the model rate).
    pub duration_seconds: f64,
}

/// Validate a declared capture sample rate.
pub fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if !(8_000..=96_000).contains(&sample_rate) {
        return Err(EngineError::InvalidAudioFormat(format!(
            "sample rate {sample_rate} Hz is outside valid range [8000, 96000]"
        )));
    }
    Ok(())
}

/// Decode base64 f32le mono PCM, validating length, count, rate and range.
pub fn decode_pcm_base64(pcm_b64: &str, sample_rate: u32) -> Result<DecodedAudio> {
    validate_sample_rate(sample_rate)?;

    let bytes = BASE64.decode(pcm_b64).map_err(|e| {
        EngineError::InvalidAudioFormat(format!("failed to decode base64: {e}"))
    })?;

    if bytes.len() % 4 != 0 {
        return Err(EngineError::InvalidAudioFormat(format!(
            "PCM byte length {} is not a multiple of 4 (float32 size)",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if samples.is_empty() {
        return Err(EngineError::InvalidAudioFormat(
            "decoded PCM contains zero samples".to_string(),
        ));
    }

    validate_range(&samples)?;

    let duration_seconds = samples.len() as f64 / sample_rate as f64;
    Ok(DecodedAudio {
        samples,
        duration_seconds,
    })
}

fn validate_range(samples: &[f32]) -> Result<()> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &s in samples {
        if !s.is_finite() {
            return Err(EngineError::InvalidAudioFormat(
                "PCM contains a non-finite sample".to_string(),
            ));
        }
        min = min.min(s);
        max = max.max(s);
    }
    if min < -1.0 - RANGE_EPSILON || max > 1.0 + RANGE_EPSILON {
        return Err(EngineError::InvalidAudioFormat(format!(
            "audio range [{min:.4}, {max:.4}] exceeds allowed range [-1.0, 1.0]"
        )));
    }
    Ok(())
}

/// Fold interleaved multi-channel samples to mono by averaging channels.
/// Single-channel input is returned unchanged.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

//! Pluggable speech-to-text backends.
//!
//! Two layers: a `SpeechDecoder` turns one window of model-rate audio into
//! text, and `StreamingSttBackend` wraps any decoder with the rolling
//! capture-rate buffer, resampling, and segment timing the engine needs.
//! Backends are stateful and never shared between sessions; the owning
//! session serializes access with its STT mutex.

pub mod echo;
pub mod parakeet;
pub mod stream;
pub mod whisper;

pub use stream::StreamingSttBackend;

use crate::config::{Config, RuntimeMode};
use crate::error::{EngineError, Result};

/// A transcribed stretch of audio in capture-time coordinates. The
/// transcript buffer assigns arrival order; backends only supply timing.
#[derive(Debug, Clone)]
pub struct SttSegment {
    pub text: String,
    pub start_s: f64,
    pub end_s: f64,
}

/// Decodes one window of mono f32 audio at the decoder's native rate.
/// `&mut self` because real decoders carry caches and streaming state.
pub trait SpeechDecoder: Send {
    /// Sample rate the decoder expects (16 kHz for all supported models).
    fn native_rate(&self) -> u32;

    /// Transcribe a window. `None` when no speech was recognized.
    fn decode(&mut self, samples: &[f32]) -> Result<Option<String>>;

    /// Identifier used in logs (model name, never file contents).
    fn describe(&self) -> String;
}

/// Contract every session-owned backend satisfies.
pub trait SttBackend: Send {
    /// Feed capture-rate mono samples; may emit zero or more segments.
    fn push(&mut self, samples: &[f32]) -> Result<Vec<SttSegment>>;

    /// Transcribe whatever remains and leave the backend empty.
    fn flush(&mut self) -> Result<Vec<SttSegment>>;

    /// Undrained audio, in capture-rate seconds.
    fn buffered_seconds(&self) -> f64;
}

/// Recognized backend identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Whisper,
    Parakeet,
}

impl BackendKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "whisper" => Ok(BackendKind::Whisper),
            "parakeet" => Ok(BackendKind::Parakeet),
            other => Err(EngineError::InvalidRequest(format!(
                "unknown STT backend {other:?}; expected \"whisper\" or \"parakeet\""
            ))),
        }
    }

    /// Identifiers advertised by /health.
    pub fn advertised() -> Vec<String> {
        vec!["whisper".to_string(), "parakeet".to_string()]
    }
}

/// Build a backend for one session.
///
/// In prod mode the requested decoder must actually be compiled in and
/// loadable, with no silent fallback. Dev mode substitutes the
/// deterministic echo decoder when the real one is absent.
pub fn create_backend(
    kind: BackendKind,
    model: &str,
    capture_rate: u32,
    config: &Config,
) -> Result<Box<dyn SttBackend>> {
    let decoder = match load_decoder(kind, model, config) {
        Ok(decoder) => decoder,
        Err(err) if config.mode == RuntimeMode::Dev => {
            tracing::warn!(backend = ?kind, %err, "substituting echo decoder (dev mode)");
            Box::new(echo::EchoDecoder::new())
        }
        Err(err) => return Err(err),
    };

    Ok(Box::new(StreamingSttBackend::new(
        decoder,
        capture_rate,
        config.stt_min_audio_seconds,
        config.stt_max_audio_seconds,
        config.stt_silence_rms,
    )?))
}

fn load_decoder(kind: BackendKind, model: &str, config: &Config) -> Result<Box<dyn SpeechDecoder>> {
    match kind {
        BackendKind::Whisper => whisper::load(model, &config.models_dir, &config.stt_language),
        BackendKind::Parakeet => parakeet::load(model, &config.models_dir),
    }
}

//! Whisper decoder via whisper-rs.
//!
//! Requires the `whisper` cargo feature (and cmake at build time). Without
//! it, `load` reports the backend unavailable so prod sessions fail fast
//! and dev sessions fall back to the echo decoder.

use std::path::PathBuf;

use crate::error::{EngineError, Result};

use super::SpeechDecoder;

/// Map the short model names the API accepts onto ggml files under the
/// models directory. Anything unrecognized is treated as an explicit path.
fn resolve_model_path(model: &str, models_dir: &str) -> PathBuf {
    const SHORT_NAMES: &[&str] = &[
        "tiny", "base", "small", "medium", "large", "large-v2", "large-v3", "turbo",
    ];
    let stem = model.strip_suffix(".en").unwrap_or(model);
    if SHORT_NAMES.contains(&stem) {
        PathBuf::from(models_dir).join(format!("ggml-{stem}.bin"))
    } else {
        PathBuf::from(model)
    }
}

#[cfg(feature = "whisper")]
pub fn load(model: &str, models_dir: &str, language: &str) -> Result<Box<dyn SpeechDecoder>> {
    Ok(Box::new(WhisperDecoder::new(model, models_dir, language)?))
}

#[cfg(not(feature = "whisper"))]
pub fn load(model: &str, models_dir: &str, _language: &str) -> Result<Box<dyn SpeechDecoder>> {
    let path = resolve_model_path(model, models_dir);
    Err(EngineError::SttBackendUnavailable(format!(
        "whisper support is not compiled in (model {}); rebuild with --features whisper",
        path.display()
    )))
}

#[cfg(feature = "whisper")]
pub struct WhisperDecoder {
    context: whisper_rs::WhisperContext,
    model_name: String,
    language: String,
}

#[cfg(feature = "whisper")]
impl WhisperDecoder {
    pub fn new(model: &str, models_dir: &str, language: &str) -> Result<Self> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        let path = resolve_model_path(model, models_dir);
        if !path.exists() {
            return Err(EngineError::SttBackendUnavailable(format!(
                "whisper model file not found: {}",
                path.display()
            )));
        }

        let params = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(
            path.to_str().ok_or_else(|| {
                EngineError::SttBackendUnavailable("non-UTF-8 model path".to_string())
            })?,
            params,
        )
        .map_err(|e| {
            EngineError::SttBackendUnavailable(format!("failed to load whisper model: {e}"))
        })?;

        Ok(Self {
            context,
            model_name: model.to_string(),
            language: language.to_string(),
        })
    }
}

#[cfg(feature = "whisper")]
impl SpeechDecoder for WhisperDecoder {
    fn native_rate(&self) -> u32 {
        16_000
    }

    fn decode(&mut self, samples: &[f32]) -> Result<Option<String>> {
        use whisper_rs::{FullParams, SamplingStrategy};

        let mut state = self.context.create_state().map_err(|e| {
            EngineError::SttBackendFailure(format!("failed to create whisper state: {e}"))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| EngineError::SttBackendFailure(format!("whisper inference failed: {e}")))?;

        let n = state
            .full_n_segments()
            .map_err(|e| EngineError::SttBackendFailure(format!("whisper segments: {e}")))?;

        let mut text = String::new();
        for i in 0..n {
            if let Ok(segment) = state.full_get_segment_text(i) {
                text.push_str(&segment);
            }
        }
        let text = text.trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn describe(&self) -> String {
        format!("whisper:{}", self.model_name)
    }
}

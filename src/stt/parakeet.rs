//! Parakeet-TDT decoder via parakeet-rs (ONNX Runtime under the hood).
//!
//! Requires the `parakeet` cargo feature. The model identifier is a
//! directory containing the exported encoder/decoder ONNX files; short
//! identifiers resolve under the models directory.

use std::path::PathBuf;

use crate::error::{EngineError, Result};

use super::SpeechDecoder;

fn resolve_model_dir(model: &str, models_dir: &str) -> PathBuf {
    let path = PathBuf::from(model);
    if path.is_absolute() || model.contains('/') {
        path
    } else {
        PathBuf::from(models_dir).join(model)
    }
}

#[cfg(feature = "parakeet")]
pub fn load(model: &str, models_dir: &str) -> Result<Box<dyn SpeechDecoder>> {
    Ok(Box::new(ParakeetDecoder::new(model, models_dir)?))
}

#[cfg(not(feature = "parakeet"))]
pub fn load(model: &str, models_dir: &str) -> Result<Box<dyn SpeechDecoder>> {
    let dir = resolve_model_dir(model, models_dir);
    Err(EngineError::SttBackendUnavailable(format!(
        "parakeet support is not compiled in (model {}); rebuild with --features parakeet",
        dir.display()
    )))
}

#[cfg(feature = "parakeet")]
pub struct ParakeetDecoder {
    inner: parakeet_rs::ParakeetTDT,
    model_name: String,
}

#[cfg(feature = "parakeet")]
impl ParakeetDecoder {
    pub fn new(model: &str, models_dir: &str) -> Result<Self> {
        let dir = resolve_model_dir(model, models_dir);
        if !dir.exists() {
            return Err(EngineError::SttBackendUnavailable(format!(
                "parakeet model directory not found: {}",
                dir.display()
            )));
        }

        let exec_config = parakeet_rs::ExecutionConfig::new()
            .with_execution_provider(parakeet_rs::ExecutionProvider::Cpu);

        let inner = parakeet_rs::ParakeetTDT::from_pretrained(&dir, Some(exec_config))
            .map_err(|e| {
                EngineError::SttBackendUnavailable(format!(
                    "failed to load parakeet model from {}: {e}",
                    dir.display()
                ))
            })?;

        Ok(Self {
            inner,
            model_name: model.to_string(),
        })
    }
}

#[cfg(feature = "parakeet")]
impl SpeechDecoder for ParakeetDecoder {
    fn native_rate(&self) -> u32 {
        16_000
    }

    fn decode(&mut self, samples: &[f32]) -> Result<Option<String>> {
        let result = self
            .inner
            .transcribe_samples(samples.to_vec(), 16_000, 1)
            .map_err(|e| {
                EngineError::SttBackendFailure(format!("parakeet inference failed: {e}"))
            })?;

        let text = result.text.trim().to_string();
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn describe(&self) -> String {
        format!("parakeet:{}", self.model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_identifiers_resolve_into_models_dir() {
        let dir = resolve_model_dir("parakeet-tdt-0.6b-v3", "models");
        assert_eq!(dir, PathBuf::from("models/parakeet-tdt-0.6b-v3"));
    }

    #[test]
    fn paths_pass_through() {
        let dir = resolve_model_dir("/opt/parakeet", "models");
        assert_eq!(dir, PathBuf::from("/opt/parakeet"));
    }
}

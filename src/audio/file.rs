//! WAV file loading for the offline batch tool.
//!
//! Reads 16-bit integer or 32-bit float WAV, folds interleaved channels to
//! mono, and reports the file's native sample rate. Live sessions never
//! touch this path; only the `process_file` binary does.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use super::codec::to_mono;

pub struct AudioFile {
    pub path: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open WAV file {}", path.display()))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .context("failed to read f32 samples")?,
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<_, _>>()
                .context("failed to read i16 samples")?,
            (format, bits) => {
                bail!("unsupported WAV encoding: {bits}-bit {format:?} (expected 16-bit int or 32-bit float)")
            }
        };

        let samples = to_mono(&interleaved, spec.channels);
        info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            seconds = samples.len() as f64 / spec.sample_rate as f64,
            "audio file loaded"
        );

        Ok(Self {
            path: path.display().to_string(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

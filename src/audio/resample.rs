//! Sample-rate conversion on top of a rubato `FastFixedIn` resampler.
//!
//! Capture clients may deliver audio at any rate in [8, 96] kHz while the
//! STT decoders want their native rate (16 kHz for every supported model).
//! `RateConverter` bridges that gap on the blocking STT path, where
//! allocation is allowed. When the rates already match it is a passthrough
//! and no rubato session is created.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{EngineError, Result};

/// Input frames fed to rubato per process call.
const CHUNK_SIZE: usize = 1024;

/// Streaming f32-mono converter between two fixed sample rates.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Partial input carried between calls.
    input_buf: Vec<f32>,
    /// Pre-allocated `[1][output_frames_max]` output buffer.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    pub fn new(src_rate: u32, dst_rate: u32) -> Result<Self> {
        if src_rate == dst_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                output_buf: Vec::new(),
            });
        }

        let ratio = dst_rate as f64 / src_rate as f64;
        let resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_SIZE, 1).map_err(
                |e| EngineError::SttBackendFailure(format!("resampler init ({src_rate}→{dst_rate}): {e}")),
            )?;

        let max_out = resampler.output_frames_max();
        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Feed samples, returning whatever full blocks convert to (may be
    /// empty while input accumulates). Passthrough mode echoes the input.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(samples.to_vec());
        };

        self.input_buf.extend_from_slice(samples);

        let mut out = Vec::new();
        while self.input_buf.len() >= CHUNK_SIZE {
            let block = &self.input_buf[..CHUNK_SIZE];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[block], &mut self.output_buf, None)
                .map_err(|e| EngineError::SttBackendFailure(format!("resampler process: {e}")))?;
            out.extend_from_slice(&self.output_buf[0][..produced]);
            self.input_buf.drain(..CHUNK_SIZE);
        }
        Ok(out)
    }

    /// Convert the remaining tail (zero-padded to a full block) and reset.
    pub fn drain(&mut self) -> Result<Vec<f32>> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            self.input_buf.clear();
            return Ok(Vec::new());
        }
        let pad = CHUNK_SIZE - (self.input_buf.len() % CHUNK_SIZE);
        if pad != CHUNK_SIZE {
            self.input_buf.extend(std::iter::repeat(0.0).take(pad));
        }
        let pending = std::mem::take(&mut self.input_buf);
        self.process(&pending)
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}

/// One-shot conversion of a complete buffer between two rates. Amplitude is
/// preserved within interpolation tolerance and output length tracks
/// `len * dst / src`.
pub fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Result<Vec<f32>> {
    if src_rate == dst_rate {
        return Ok(samples.to_vec());
    }
    let mut converter = RateConverter::new(src_rate, dst_rate)?;
    let mut out = converter.process(samples)?;
    out.extend(converter.drain()?);

    // Zero-padding in drain() may overshoot; trim to the exact ratio.
    let expected =
        ((samples.len() as f64) * dst_rate as f64 / src_rate as f64).round() as usize;
    out.truncate(expected);
    Ok(out)
}

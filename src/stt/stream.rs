//! Rolling-buffer streaming wrapper shared by every decoder.
//!
//! Capture-rate audio accumulates until at least `min_audio_seconds` is
//! buffered, then the whole window is resampled to the decoder's native
//! rate and transcribed in one shot. Segment timestamps are derived from
//! the capture-rate stream position, so durations always reflect what the
//! client actually sent.

use crate::audio::{level, resample};
use crate::error::Result;

use super::{SpeechDecoder, SttBackend, SttSegment};

pub struct StreamingSttBackend {
    decoder: Box<dyn SpeechDecoder>,
    capture_rate: u32,
    min_audio_seconds: f64,
    max_audio_seconds: f64,
    /// Windows with RMS below this are skipped without decoding.
    silence_rms: f32,
    /// Pending capture-rate samples not yet transcribed.
    buffer: Vec<f32>,
    /// Capture-time position (seconds) of the start of `buffer`.
    stream_pos_s: f64,
}

impl StreamingSttBackend {
    pub fn new(
        decoder: Box<dyn SpeechDecoder>,
        capture_rate: u32,
        min_audio_seconds: f64,
        max_audio_seconds: f64,
        silence_rms: f32,
    ) -> Result<Self> {
        tracing::info!(
            decoder = %decoder.describe(),
            capture_rate,
            "stt backend ready"
        );
        Ok(Self {
            decoder,
            capture_rate,
            min_audio_seconds,
            max_audio_seconds,
            silence_rms,
            buffer: Vec::new(),
            stream_pos_s: 0.0,
        })
    }

    fn transcribe_window(&mut self) -> Result<Vec<SttSegment>> {
        let window = std::mem::take(&mut self.buffer);
        let window_seconds = window.len() as f64 / self.capture_rate as f64;
        let start_s = self.stream_pos_s;
        self.stream_pos_s += window_seconds;

        if level::rms(&window) < self.silence_rms {
            return Ok(Vec::new());
        }

        let native = if self.capture_rate == self.decoder.native_rate() {
            window
        } else {
            resample(&window, self.capture_rate, self.decoder.native_rate())?
        };

        // The window is consumed even on error; the next push starts clean.
        let text = self.decoder.decode(&native)?;

        Ok(match text {
            Some(text) if !text.trim().is_empty() => vec![SttSegment {
                text: text.trim().to_string(),
                start_s,
                end_s: start_s + window_seconds,
            }],
            _ => Vec::new(),
        })
    }
}

impl SttBackend for StreamingSttBackend {
    fn push(&mut self, samples: &[f32]) -> Result<Vec<SttSegment>> {
        self.buffer.extend_from_slice(samples);

        let buffered = self.buffered_seconds();
        if buffered < self.min_audio_seconds {
            return Ok(Vec::new());
        }
        if buffered > self.max_audio_seconds {
            tracing::debug!(buffered_s = buffered, "max stt window reached, transcribing");
        }
        self.transcribe_window()
    }

    fn flush(&mut self) -> Result<Vec<SttSegment>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        self.transcribe_window()
    }

    fn buffered_seconds(&self) -> f64 {
        self.buffer.len() as f64 / self.capture_rate as f64
    }
}

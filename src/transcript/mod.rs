//! Append-only transcript store with duration-based chunk sealing.
//!
//! Segments arrive from the STT backend in emission order and are folded
//! into fixed-duration chunks for the MAP phase. Everything lives in memory
//! only: nothing here ever touches disk, and the whole buffer is dropped
//! when its session reaches a terminal state.

/// A contiguous transcribed utterance emitted by the STT backend.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    /// Non-empty UTF-8 text, punctuated where the backend supports it.
    pub text: String,
    /// Start offset in capture-time seconds since session start.
    pub start_s: f64,
    /// End offset in capture-time seconds since session start.
    pub end_s: f64,
    /// Monotonic arrival order within the session.
    pub arrival_index: u64,
}

/// An ordered, sealed group of segments spanning at least the configured
/// chunk duration (or whatever remained at stop time). Never modified once
/// emitted.
#[derive(Debug, Clone)]
pub struct TranscriptChunk {
    pub index: usize,
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptChunk {
    /// Concatenated text, the MAP input.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&seg.text);
        }
        out
    }

    pub fn start_s(&self) -> f64 {
        self.segments.first().map(|s| s.start_s).unwrap_or(0.0)
    }

    pub fn end_s(&self) -> f64 {
        self.segments.last().map(|s| s.end_s).unwrap_or(0.0)
    }
}

/// Append-only segment store; single consumer, FIFO chunk order.
pub struct TranscriptBuffer {
    chunk_duration_seconds: f64,
    pending: Vec<TranscriptSegment>,
    next_arrival_index: u64,
    chunks_sealed: usize,
    total_segments: usize,
    /// Running concatenation of all text seen, kept solely for the
    /// low-content guard at stop time.
    full_text: String,
}

impl TranscriptBuffer {
    pub fn new(chunk_duration_seconds: f64) -> Self {
        Self {
            chunk_duration_seconds,
            pending: Vec::new(),
            next_arrival_index: 0,
            chunks_sealed: 0,
            total_segments: 0,
            full_text: String::new(),
        }
    }

    /// Append a segment; returns a sealed chunk when the in-progress run
    /// reaches the chunk duration.
    pub fn add(&mut self, text: String, start_s: f64, end_s: f64) -> Option<TranscriptChunk> {
        debug_assert!(end_s >= start_s);

        if !self.full_text.is_empty() {
            self.full_text.push(' ');
        }
        self.full_text.push_str(&text);

        let segment = TranscriptSegment {
            text,
            start_s,
            end_s,
            arrival_index: self.next_arrival_index,
        };
        self.next_arrival_index += 1;
        self.total_segments += 1;
        self.pending.push(segment);

        let span = end_s - self.pending[0].start_s;
        if span >= self.chunk_duration_seconds {
            Some(self.seal())
        } else {
            None
        }
    }

    /// Seal whatever is in progress, even if shorter than the chunk
    /// duration. Returns `None` when nothing is pending.
    pub fn force_finalize(&mut self) -> Option<TranscriptChunk> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.seal())
        }
    }

    fn seal(&mut self) -> TranscriptChunk {
        let chunk = TranscriptChunk {
            index: self.chunks_sealed,
            segments: std::mem::take(&mut self.pending),
        };
        self.chunks_sealed += 1;
        chunk
    }

    /// Concatenation of every segment seen so far. Used only by the
    /// low-content guard.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Segments appended but not yet folded into a sealed chunk.
    pub fn pending_segments(&self) -> usize {
        self.pending.len()
    }

    pub fn chunks_sealed(&self) -> usize {
        self.chunks_sealed
    }

    pub fn total_segments(&self) -> usize {
        self.total_segments
    }
}

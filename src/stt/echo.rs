//! Deterministic echo decoder for dev mode and tests.
//!
//! Applies a peak-amplitude gate so silence transcribes to nothing, then
//! cycles through a fixed sentence list. Forbidden in production: the
//! factory only reaches this type in dev mode.

use crate::error::Result;

use super::SpeechDecoder;

/// Windows quieter than this are treated as silence.
const SILENCE_PEAK: f32 = 1e-4;

const CANNED_LINES: &[&str] = &[
    "Let me pull up the numbers from last quarter.",
    "We should loop in the portfolio team before deciding.",
    "The allocation review is scheduled for next month.",
    "Can you walk me through the fee structure again?",
    "I will send over the follow-up materials tomorrow.",
    "That matches what we heard from the custodian.",
    "Let's set up a call with the decision makers.",
    "The mandate size is still under discussion internally.",
];

pub struct EchoDecoder {
    counter: usize,
}

impl EchoDecoder {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for EchoDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechDecoder for EchoDecoder {
    fn native_rate(&self) -> u32 {
        16_000
    }

    fn decode(&mut self, samples: &[f32]) -> Result<Option<String>> {
        let peak = samples.iter().fold(0f32, |m, s| m.max(s.abs()));
        if peak < SILENCE_PEAK {
            return Ok(None);
        }
        let line = CANNED_LINES[self.counter % CANNED_LINES.len()];
        self.counter += 1;
        Ok(Some(line.to_string()))
    }

    fn describe(&self) -> String {
        "echo (dev)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_gates_to_none() {
        let mut d = EchoDecoder::new();
        assert!(d.decode(&vec![0.0; 16_000]).unwrap().is_none());
    }

    #[test]
    fn speech_cycles_deterministically() {
        let mut a = EchoDecoder::new();
        let mut b = EchoDecoder::new();
        let window = vec![0.3f32; 16_000];
        for _ in 0..CANNED_LINES.len() + 2 {
            assert_eq!(a.decode(&window).unwrap(), b.decode(&window).unwrap());
        }
    }
}

//! Process-wide engine counters.
//!
//! Cheap atomic counters covering session lifecycle and request traffic,
//! surfaced through GET /metrics and the shutdown log line. Values reset
//! with the process; nothing here is persisted.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::session::SessionStatus;

#[derive(Debug, Default)]
pub struct EngineMetrics {
    sessions_started: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_insufficient: AtomicU64,
    sessions_failed: AtomicU64,
    audio_chunks_accepted: AtomicU64,
    /// Milliseconds of accepted audio, summed at capture rate.
    audio_millis_total: AtomicU64,
    backpressure_rejections: AtomicU64,
}

/// Serializable snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_insufficient: u64,
    pub sessions_failed: u64,
    pub audio_chunks_accepted: u64,
    pub audio_seconds_total: f64,
    pub backpressure_rejections: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_finished(&self, status: SessionStatus) {
        let counter = match status {
            SessionStatus::Completed => &self.sessions_completed,
            SessionStatus::InsufficientContent => &self.sessions_insufficient,
            SessionStatus::Failed => &self.sessions_failed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn audio_accepted(&self, seconds: f64) {
        self.audio_chunks_accepted.fetch_add(1, Ordering::Relaxed);
        self.audio_millis_total
            .fetch_add((seconds * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn backpressure_rejection(&self) {
        self.backpressure_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            sessions_insufficient: self.sessions_insufficient.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            audio_chunks_accepted: self.audio_chunks_accepted.load(Ordering::Relaxed),
            audio_seconds_total: self.audio_millis_total.load(Ordering::Relaxed) as f64 / 1000.0,
            backpressure_rejections: self.backpressure_rejections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.session_started();
        metrics.session_finished(SessionStatus::Completed);
        metrics.session_finished(SessionStatus::Failed);
        metrics.session_finished(SessionStatus::Active); // not terminal, ignored
        metrics.audio_accepted(1.5);
        metrics.audio_accepted(0.25);
        metrics.backpressure_rejection();

        let snap = metrics.snapshot();
        assert_eq!(snap.sessions_started, 1);
        assert_eq!(snap.sessions_completed, 1);
        assert_eq!(snap.sessions_failed, 1);
        assert_eq!(snap.sessions_insufficient, 0);
        assert_eq!(snap.audio_chunks_accepted, 2);
        assert!((snap.audio_seconds_total - 1.75).abs() < 1e-9);
        assert_eq!(snap.backpressure_rejections, 1);
    }
}

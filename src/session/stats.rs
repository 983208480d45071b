use std::path::PathBuf;

use serde::Serialize;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    Active,
    Stopping,
    Completed,
    InsufficientContent,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::InsufficientContent | SessionStatus::Failed
        )
    }
}

/// Result of /audio_chunk, surfaced for backpressure monitoring.
#[derive(Debug, Clone, Copy)]
pub struct PushOutcome {
    /// Undrained audio inside the STT backend, in capture-rate seconds.
    pub buffered_seconds: f64,
    /// Pending segments not yet folded into a chunk, plus chunks not yet
    /// MAPped.
    pub queue_depth: usize,
    /// Seconds of audio this call added, at the declared capture rate.
    pub accepted_seconds: f64,
}

/// Terminal result of a session, retained in the registry history.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub summary_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub session_status: SessionStatus,
}

/// Metadata-only snapshot used for logging at stop time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub status: SessionStatus,
    pub total_audio_seconds: f64,
    pub total_segments: usize,
    pub chunk_count: usize,
    pub map_summary_count: usize,
}

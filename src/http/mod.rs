//! HTTP API consumed by the out-of-process capture client:
//! - GET  /health              - versions plus advertised STT backends / LLM models
//! - POST /start_session       - create a session
//! - POST /audio_chunk         - stream base64 f32le mono PCM into a session
//! - POST /stop_session        - finalize, summarize, persist artifacts
//! - GET  /sessions            - tracked sessions and their statuses
//! - GET  /sessions/:id/stats  - metadata snapshot of a live session
//! - GET  /metrics             - process-wide engine counters

pub mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

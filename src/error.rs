use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// All errors produced by the engine.
///
/// Every variant carries one of the stable `error_code` tokens of the wire
/// protocol; anything that escapes this set collapses to `INTERNAL_ERROR`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid or missing engine auth token")]
    Unauthorized,

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session already active: {0}")]
    SessionAlreadyActive(String),

    #[error("session id {0} has already been used")]
    SessionAlreadyExists(String),

    #[error("session {0} is still starting")]
    SessionNotReady(String),

    #[error("{0}")]
    InvalidAudioFormat(String),

    #[error("map queue depth {depth} exceeds limit {limit}")]
    EngineOverloaded { depth: usize, limit: usize },

    #[error("{0}")]
    SttBackendUnavailable(String),

    #[error("{0}")]
    SttBackendFailure(String),

    #[error("{0}")]
    LlmUnavailable(String),

    #[error("map worker did not drain within {0} s")]
    MapStall(u64),

    #[error("{0}")]
    OutputWriteFailure(String),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Stable wire token for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::InvalidRequest(_) => "INVALID_REQUEST",
            EngineError::Unauthorized => "UNAUTHORIZED",
            EngineError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            EngineError::SessionAlreadyActive(_) => "SESSION_ALREADY_ACTIVE",
            EngineError::SessionAlreadyExists(_) => "SESSION_ALREADY_EXISTS",
            EngineError::SessionNotReady(_) => "SESSION_NOT_READY",
            EngineError::InvalidAudioFormat(_) => "INVALID_AUDIO_FORMAT",
            EngineError::EngineOverloaded { .. } => "ENGINE_OVERLOADED",
            EngineError::SttBackendUnavailable(_) => "STT_BACKEND_UNAVAILABLE",
            EngineError::SttBackendFailure(_) => "STT_BACKEND_FAILURE",
            EngineError::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            EngineError::MapStall(_) => "MAP_STALL",
            EngineError::OutputWriteFailure(_) => "OUTPUT_WRITE_FAILURE",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::InvalidRequest(_) | EngineError::InvalidAudioFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::SessionAlreadyActive(_)
            | EngineError::SessionAlreadyExists(_)
            | EngineError::SessionNotReady(_) => StatusCode::CONFLICT,
            EngineError::EngineOverloaded { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::SttBackendUnavailable(_)
            | EngineError::SttBackendFailure(_)
            | EngineError::LlmUnavailable(_)
            | EngineError::MapStall(_)
            | EngineError::OutputWriteFailure(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            EngineError::Unauthorized => Some("Provide the X-Engine-Token header".to_string()),
            EngineError::SessionNotFound(_) => {
                Some("Start a new session via /start_session".to_string())
            }
            EngineError::SessionAlreadyActive(_) => {
                Some("Stop the existing session before starting a new one".to_string())
            }
            EngineError::EngineOverloaded { .. } => {
                Some("Slow down or drop capture frames until queue_depth falls".to_string())
            }
            EngineError::LlmUnavailable(msg) => {
                // The message names the model when the runtime is up but the
                // model is missing.
                if let Some(model) = msg.strip_prefix("model not found: ") {
                    Some(format!("Run: ollama pull {model}"))
                } else {
                    Some("Ensure the local LLM runtime is running".to_string())
                }
            }
            _ => None,
        }
    }
}

/// Unified error body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error_code: &'static str,
    pub message: String,
    pub details: serde_json::Value,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let details = match self.hint() {
            Some(hint) => serde_json::json!({ "hint": hint }),
            None => serde_json::json!({}),
        };
        let body = ErrorBody {
            status: "error",
            error_code: self.error_code(),
            message: self.to_string(),
            details,
        };
        (self.status(), Json(body)).into_response()
    }
}

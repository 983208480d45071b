use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::AppState;
use crate::error::{EngineError, Result};
use crate::output::{OutputConfig, OutputWriter};
use crate::session::{Session, SessionConfig, SessionStatus};
use crate::stt::{self, BackendKind};
use crate::summarizer::{default_prompts, MapReduceSummarizer, PromptSet};

pub const API_VERSION: &str = "1";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine_version: &'static str,
    pub api_version: &'static str,
    pub stt_backends: Vec<String>,
    pub llm_models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSettings {
    pub chunk_summary_prompt: String,
    pub final_summary_prompt: String,
    #[serde(default)]
    pub data_extraction_prompt: Option<String>,
    #[serde(default = "default_llm_model")]
    pub llm_model_name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_csv_path")]
    pub csv_export_path: String,
    #[serde(default = "default_append_csv")]
    pub append_csv: bool,
    /// Per-meeting subfolders named from extracted data instead of flat
    /// timestamped files.
    #[serde(default)]
    pub companion_folders: bool,
}

fn default_llm_model() -> String {
    "qwen3:4b-instruct".to_string()
}
fn default_output_dir() -> String {
    "~/Documents/Meeting Summaries".to_string()
}
fn default_csv_path() -> String {
    "~/Documents/Meeting Summaries/meetings.csv".to_string()
}
fn default_append_csv() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub session_id: String,
    pub model: String,
    pub sample_rate: u32,
    pub user_settings: UserSettings,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AudioChunkRequest {
    pub session_id: String,
    /// Capture-side timestamp; accepted for wire compatibility.
    #[serde(default)]
    pub timestamp: f64,
    pub pcm_b64: String,
    pub sample_rate: u32,
}

#[derive(Debug, Serialize)]
pub struct AudioChunkResponse {
    pub status: &'static str,
    pub buffered_seconds: f64,
    pub queue_depth: usize,
}

#[derive(Debug, Deserialize)]
pub struct StopSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub status: &'static str,
    pub summary_path: Option<String>,
    pub data_path: Option<String>,
    pub csv_path: Option<String>,
    pub session_status: SessionStatus,
}

// ============================================================================
// Helpers
// ============================================================================

/// Every endpoint except /health requires X-Engine-Token when a token is
/// configured.
fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<()> {
    if state.config.auth_token.is_empty() {
        return Ok(());
    }
    let provided = headers
        .get("x-engine-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided == state.config.auth_token {
        Ok(())
    } else {
        Err(EngineError::Unauthorized)
    }
}

fn parse_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(EngineError::InvalidRequest(rejection.body_text())),
    }
}

fn validate_session_id(session_id: &str) -> Result<()> {
    uuid::Uuid::parse_str(session_id)
        .map(|_| ())
        .map_err(|_| EngineError::InvalidRequest(format!("session_id {session_id:?} is not a UUID")))
}

fn path_string(path: &Option<std::path::PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let llm_models = state.llm.list_models().await.unwrap_or_default();
    Json(HealthResponse {
        status: "ok",
        engine_version: env!("CARGO_PKG_VERSION"),
        api_version: API_VERSION,
        stt_backends: BackendKind::advertised(),
        llm_models,
    })
}

/// POST /start_session
pub async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<StartSessionResponse>> {
    require_auth(&state, &headers)?;
    let req = parse_body(payload)?;

    validate_session_id(&req.session_id)?;
    let backend = BackendKind::parse(&req.model)?;
    if !(8_000..=96_000).contains(&req.sample_rate) {
        return Err(EngineError::InvalidRequest(format!(
            "sample_rate {} Hz is outside valid range [8000, 96000]",
            req.sample_rate
        )));
    }
    if !req.user_settings.chunk_summary_prompt.contains("{text}") {
        return Err(EngineError::InvalidRequest(
            "chunk_summary_prompt must contain a {text} slot".to_string(),
        ));
    }
    if !req.user_settings.final_summary_prompt.contains("{summaries_text}") {
        return Err(EngineError::InvalidRequest(
            "final_summary_prompt must contain a {summaries_text} slot".to_string(),
        ));
    }

    info!(
        session_id = %req.session_id,
        model = %req.model,
        sample_rate = req.sample_rate,
        llm_model = %req.user_settings.llm_model_name,
        "starting session"
    );

    // Fail fast before any expensive backend construction.
    state.registry.check_can_create(&req.session_id)?;
    if let Err(err) = state.llm.ensure_model(&req.user_settings.llm_model_name).await {
        if !state.config.llm_auto_pull {
            return Err(err);
        }
        state
            .llm
            .pull_model(&req.user_settings.llm_model_name)
            .await?;
        state.llm.ensure_model(&req.user_settings.llm_model_name).await?;
    }

    let defaults = default_prompts();
    let prompts = PromptSet {
        chunk_summary: req.user_settings.chunk_summary_prompt.clone(),
        final_summary: req.user_settings.final_summary_prompt.clone(),
        data_extraction: req
            .user_settings
            .data_extraction_prompt
            .clone()
            .unwrap_or(defaults.data_extraction),
    };

    let output = OutputConfig {
        output_dir: req.user_settings.output_dir.clone(),
        csv_export_path: req.user_settings.csv_export_path.clone(),
        append_csv: req.user_settings.append_csv,
        companion_folders: req.user_settings.companion_folders,
    };

    let session_config = SessionConfig::from_engine(
        &state.config,
        req.session_id.clone(),
        backend,
        req.model.clone(),
        req.sample_rate,
        req.user_settings.llm_model_name.clone(),
        prompts,
        output,
    );

    // Model load can block for seconds; keep it off the async threads.
    let engine_config = (*state.config).clone();
    let stt_model = session_config.stt_model.clone();
    let capture_rate = session_config.capture_sample_rate;
    let stt_backend = tokio::task::spawn_blocking(move || {
        stt::create_backend(backend, &stt_model, capture_rate, &engine_config)
    })
    .await
    .map_err(|e| EngineError::Internal(format!("stt construction task failed: {e}")))??;

    let summarizer = MapReduceSummarizer::new(
        state.llm.clone(),
        session_config.llm_model.clone(),
        session_config.prompts.clone(),
        session_config.token_budgets.clone(),
        state.llm_gate.clone(),
    );
    let writer = OutputWriter::new(session_config.output.clone(), state.csv_lock.clone());

    let session = Session::new(session_config, stt_backend, summarizer, writer);
    state.registry.insert(session)?;
    state.metrics.session_started();

    info!(session_id = %req.session_id, "session started");
    Ok(Json(StartSessionResponse { status: "ok" }))
}

/// POST /audio_chunk
pub async fn audio_chunk(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<AudioChunkRequest>, JsonRejection>,
) -> Result<Json<AudioChunkResponse>> {
    require_auth(&state, &headers)?;
    let req = parse_body(payload)?;

    let session = state
        .registry
        .get(&req.session_id)
        .ok_or_else(|| EngineError::SessionNotFound(req.session_id.clone()))?;

    let outcome = match session.push_chunk(&req.pcm_b64, req.sample_rate).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if matches!(err, EngineError::EngineOverloaded { .. }) {
                // Overloaded chunks were still processed; count them.
                state.metrics.backpressure_rejection();
            }
            return Err(err);
        }
    };
    state.metrics.audio_accepted(outcome.accepted_seconds);

    Ok(Json(AudioChunkResponse {
        status: "ok",
        buffered_seconds: outcome.buffered_seconds,
        queue_depth: outcome.queue_depth,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionListEntry {
    pub session_id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionListEntry>,
}

/// GET /sessions - every tracked session (live, then retained history).
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionListResponse>> {
    require_auth(&state, &headers)?;
    let sessions = state
        .registry
        .list()
        .into_iter()
        .map(|(session_id, status)| SessionListEntry { session_id, status })
        .collect();
    Ok(Json(SessionListResponse { sessions }))
}

/// GET /sessions/:session_id/stats - metadata snapshot of a live session.
pub async fn session_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(session_id): axum::extract::Path<String>,
) -> Result<Json<crate::session::SessionStats>> {
    require_auth(&state, &headers)?;
    let session = state
        .registry
        .get(&session_id)
        .ok_or_else(|| EngineError::SessionNotFound(session_id.clone()))?;
    Ok(Json(session.stats()))
}

/// GET /metrics - process-wide engine counters.
pub async fn metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<crate::observability::MetricsSnapshot>> {
    require_auth(&state, &headers)?;
    Ok(Json(state.metrics.snapshot()))
}

/// POST /stop_session
pub async fn stop_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<StopSessionRequest>, JsonRejection>,
) -> Result<Json<StopSessionResponse>> {
    require_auth(&state, &headers)?;
    let req = parse_body(payload)?;

    let (outcome, already_stopped) = match state.registry.stop_session(&req.session_id).await {
        Ok(result) => result,
        Err(err) => {
            // Stop failures leave the session terminal (failed); reflect
            // that in the counters before surfacing the error.
            if matches!(err, EngineError::MapStall(_) | EngineError::LlmUnavailable(_)) {
                state.metrics.session_finished(SessionStatus::Failed);
            }
            return Err(err);
        }
    };
    if !already_stopped {
        state.metrics.session_finished(outcome.session_status);
    }

    Ok(Json(StopSessionResponse {
        status: if already_stopped { "already_stopped" } else { "ok" },
        summary_path: path_string(&outcome.summary_path),
        data_path: path_string(&outcome.data_path),
        csv_path: path_string(&outcome.csv_path),
        session_status: outcome.session_status,
    }))
}

use anyhow::Result;
use serde::Deserialize;

/// Runtime mode. Production forbids every mock backend; dev substitutes
/// deterministic stand-ins so the full pipeline runs on a bare machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Prod,
    Dev,
}

impl RuntimeMode {
    pub fn is_prod(self) -> bool {
        self == RuntimeMode::Prod
    }
}

/// Engine configuration, loaded from `ENGINE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bind host. Anything other than loopback is a startup error.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_mode")]
    pub mode: RuntimeMode,

    /// Empty disables auth; otherwise every endpoint except /health requires
    /// a matching X-Engine-Token header.
    #[serde(default)]
    pub auth_token: String,

    /// Base URL of the local LLM runtime.
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    /// Pull a missing LLM model at /start_session instead of failing with
    /// a hint. Off by default: pulls can take minutes.
    #[serde(default)]
    pub llm_auto_pull: bool,

    /// Whether more than one session may be active at a time.
    #[serde(default)]
    pub allow_concurrent: bool,

    /// Seconds of transcript per map-reduce chunk.
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration_seconds: f64,

    /// Backpressure bound: queue depths above this return 429.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,

    /// STT rolling-buffer bounds, in capture-rate seconds.
    #[serde(default = "default_stt_min_audio")]
    pub stt_min_audio_seconds: f64,
    #[serde(default = "default_stt_max_audio")]
    pub stt_max_audio_seconds: f64,

    /// Soft deadline for a single decode+transcribe call.
    #[serde(default = "default_stt_deadline")]
    pub stt_soft_deadline_seconds: u64,

    /// RMS level below which a buffered window is treated as silence and
    /// skipped without invoking the decoder.
    #[serde(default = "default_silence_rms")]
    pub stt_silence_rms: f32,

    /// How long /stop_session waits for the MAP worker to drain.
    #[serde(default = "default_stop_drain")]
    pub stop_drain_timeout_seconds: u64,

    /// Completion budgets for the three LLM call shapes.
    #[serde(default = "default_chunk_tokens")]
    pub chunk_summary_max_tokens: u32,
    #[serde(default = "default_final_tokens")]
    pub final_summary_max_tokens: u32,
    #[serde(default = "default_extraction_tokens")]
    pub extraction_max_tokens: u32,

    /// FIFO cap on in-flight LLM calls across all sessions.
    #[serde(default = "default_llm_concurrency")]
    pub max_concurrent_llm_calls: usize,

    /// Low-content guard: below this many words the filler test applies.
    #[serde(default = "default_low_content_words")]
    pub low_content_min_words: usize,
    /// Fraction of words that must be filler for the guard to trip.
    #[serde(default = "default_filler_ratio")]
    pub low_content_filler_ratio: f64,
    #[serde(default = "default_filler_phrases")]
    pub filler_phrases: Vec<String>,

    /// Directory searched for local STT model files (whisper ggml etc.).
    #[serde(default = "default_models_dir")]
    pub models_dir: String,

    /// Transcription language hint; "auto" lets the model detect it.
    #[serde(default = "default_stt_language")]
    pub stt_language: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8756
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_mode() -> RuntimeMode {
    RuntimeMode::Prod
}
fn default_llm_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_chunk_duration() -> f64 {
    60.0
}
fn default_max_queue_depth() -> usize {
    64
}
fn default_stt_min_audio() -> f64 {
    2.0
}
fn default_stt_max_audio() -> f64 {
    10.0
}
fn default_stt_deadline() -> u64 {
    5
}
fn default_silence_rms() -> f32 {
    1.0e-4
}
fn default_stop_drain() -> u64 {
    120
}
fn default_chunk_tokens() -> u32 {
    300
}
fn default_final_tokens() -> u32 {
    1200
}
fn default_extraction_tokens() -> u32 {
    2000
}
fn default_llm_concurrency() -> usize {
    2
}
fn default_low_content_words() -> usize {
    30
}
fn default_filler_ratio() -> f64 {
    0.8
}
fn default_filler_phrases() -> Vec<String> {
    ["thank you", "thanks", "you", "uh", "um"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_models_dir() -> String {
    "models".to_string()
}
fn default_stt_language() -> String {
    "auto".to_string()
}

impl Config {
    /// Load configuration from `ENGINE_*` environment variables; every field
    /// has a default, so an empty environment yields a working prod config.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn is_loopback_host(&self) -> bool {
        matches!(self.host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}

impl Default for Config {
    fn default() -> Self {
        // serde fills every field, so an empty JSON object is a full config.
        serde_json::from_value(serde_json::json!({})).expect("defaults are complete")
    }
}

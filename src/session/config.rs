use crate::config::Config;
use crate::output::OutputConfig;
use crate::stt::BackendKind;
use crate::summarizer::{PromptSet, TokenBudgets};

/// Per-session configuration, immutable after /start_session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: String,
    pub backend: BackendKind,
    pub stt_model: String,
    pub capture_sample_rate: u32,
    pub llm_model: String,
    pub prompts: PromptSet,
    pub output: OutputConfig,

    pub chunk_duration_seconds: f64,
    pub max_queue_depth: usize,
    pub stt_soft_deadline_seconds: u64,
    pub stop_drain_timeout_seconds: u64,
    pub token_budgets: TokenBudgets,

    pub low_content_min_words: usize,
    pub low_content_filler_ratio: f64,
    pub filler_phrases: Vec<String>,
}

impl SessionConfig {
    /// Derive the per-session knobs from the engine config.
    pub fn from_engine(
        engine: &Config,
        session_id: String,
        backend: BackendKind,
        stt_model: String,
        capture_sample_rate: u32,
        llm_model: String,
        prompts: PromptSet,
        output: OutputConfig,
    ) -> Self {
        Self {
            session_id,
            backend,
            stt_model,
            capture_sample_rate,
            llm_model,
            prompts,
            output,
            chunk_duration_seconds: engine.chunk_duration_seconds,
            max_queue_depth: engine.max_queue_depth,
            stt_soft_deadline_seconds: engine.stt_soft_deadline_seconds,
            stop_drain_timeout_seconds: engine.stop_drain_timeout_seconds,
            token_budgets: TokenBudgets {
                chunk_summary: engine.chunk_summary_max_tokens,
                final_summary: engine.final_summary_max_tokens,
                extraction: engine.extraction_max_tokens,
            },
            low_content_min_words: engine.low_content_min_words,
            low_content_filler_ratio: engine.low_content_filler_ratio,
            filler_phrases: engine.filler_phrases.clone(),
        }
    }
}

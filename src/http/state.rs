use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::config::{Config, RuntimeMode};
use crate::observability::EngineMetrics;
use crate::session::SessionRegistry;
use crate::summarizer::{CannedLlm, LlmClient, OllamaClient};

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub llm: Arc<dyn LlmClient>,
    /// FIFO gate bounding concurrent LLM calls across sessions.
    pub llm_gate: Arc<Semaphore>,
    /// Process-wide CSV append lock.
    pub csv_lock: Arc<Mutex<()>>,
    pub metrics: Arc<EngineMetrics>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let llm: Arc<dyn LlmClient> = match config.mode {
            RuntimeMode::Prod => Arc::new(OllamaClient::new(&config.llm_url)),
            RuntimeMode::Dev => Arc::new(CannedLlm),
        };
        let llm_gate = Arc::new(Semaphore::new(config.max_concurrent_llm_calls));
        let registry = Arc::new(SessionRegistry::new(config.allow_concurrent));
        Self {
            config: Arc::new(config),
            registry,
            llm,
            llm_gate,
            csv_lock: Arc::new(Mutex::new(())),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Swap in a custom LLM client (used by tests and embedders).
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }
}

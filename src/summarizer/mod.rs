//! Map-reduce summarization over the streaming transcript.
//!
//! MAP summarizes each sealed chunk as soon as the session's worker pops
//! it; REDUCE combines the chunk summaries once at stop time; extraction
//! runs a schema-constrained request over the same summaries. Raw audio
//! never reaches this module and chunk text is not retained after MAP
//! returns.

pub mod llm;
pub mod schema;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{EngineError, Result};

pub use llm::{CannedLlm, LlmClient, OllamaClient};
pub use schema::MeetingData;

/// Substituted for a chunk summary when the LLM fails persistently, so
/// REDUCE can still run over the surviving summaries.
pub const UNAVAILABLE_SUMMARY: &str = "[summary unavailable]";

/// Prompt templates with their fill slots. `{text}` receives chunk text,
/// `{summaries_text}` the blank-line-joined chunk summaries.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub chunk_summary: String,
    pub final_summary: String,
    pub data_extraction: String,
}

#[derive(Debug, Clone)]
pub struct TokenBudgets {
    pub chunk_summary: u32,
    pub final_summary: u32,
    pub extraction: u32,
}

pub struct MapReduceSummarizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompts: PromptSet,
    budgets: TokenBudgets,
    /// FIFO gate bounding in-flight LLM calls across all sessions.
    gate: Arc<Semaphore>,
}

impl MapReduceSummarizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: String,
        prompts: PromptSet,
        budgets: TokenBudgets,
        gate: Arc<Semaphore>,
    ) -> Self {
        Self {
            llm,
            model,
            prompts,
            budgets,
            gate,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn gated_generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("LLM gate closed".to_string()))?;
        self.llm.generate(&self.model, prompt, max_tokens).await
    }

    async fn gated_structured(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        max_tokens: u32,
    ) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("LLM gate closed".to_string()))?;
        self.llm
            .generate_structured(&self.model, prompt, schema, max_tokens)
            .await
    }

    /// MAP: summarize one chunk. Transient failures get one retry; the
    /// caller converts a persistent failure into `UNAVAILABLE_SUMMARY`.
    pub async fn map(&self, chunk_text: &str) -> Result<String> {
        if chunk_text.trim().is_empty() {
            return Ok(String::new());
        }
        let prompt = self.prompts.chunk_summary.replace("{text}", chunk_text);

        match self.gated_generate(&prompt, self.budgets.chunk_summary).await {
            Ok(summary) => Ok(summary),
            Err(first) => {
                warn!(error = %first, "chunk summary failed, retrying once");
                self.gated_generate(&prompt, self.budgets.chunk_summary).await
            }
        }
    }

    /// REDUCE: combine the ordered chunk summaries into the final summary.
    pub async fn reduce(&self, chunk_summaries: &[String]) -> Result<String> {
        let summaries_text = join_summaries(chunk_summaries);
        let prompt = self
            .prompts
            .final_summary
            .replace("{summaries_text}", &summaries_text);

        match self.gated_generate(&prompt, self.budgets.final_summary).await {
            Ok(summary) => Ok(summary),
            Err(first) => {
                warn!(error = %first, "final summary failed, retrying once");
                self.gated_generate(&prompt, self.budgets.final_summary).await
            }
        }
    }

    /// Extraction: schema-constrained request over the chunk summaries.
    /// Falls back to raw-JSON once on parse failure, then to empty data;
    /// extraction problems never fail the session.
    pub async fn extract(&self, chunk_summaries: &[String]) -> MeetingData {
        if chunk_summaries.is_empty() {
            return MeetingData::default();
        }
        let summaries_text = join_summaries(chunk_summaries);
        let prompt = self
            .prompts
            .data_extraction
            .replace("{summaries_text}", &summaries_text);
        let schema = schema::meeting_data_schema();

        let first = self
            .gated_structured(&prompt, &schema, self.budgets.extraction)
            .await;
        if let Ok(text) = &first {
            if let Ok(data) = MeetingData::parse(text) {
                return data;
            }
        }

        // Second attempt: ask for raw JSON with the schema inlined into the
        // prompt, for runtimes without constrained generation.
        let raw_prompt = format!(
            "{prompt}\n\nRespond with ONLY a JSON object matching this schema:\n{}",
            serde_json::to_string_pretty(&schema).unwrap_or_default()
        );
        let second = self.gated_generate(&raw_prompt, self.budgets.extraction).await;
        if let Ok(text) = &second {
            if let Ok(data) = MeetingData::parse(text) {
                return data;
            }
        }

        warn!(
            error_code = "EXTRACTION_FALLBACK",
            "structured extraction failed twice, returning empty meeting data"
        );
        MeetingData::default()
    }
}

fn join_summaries(summaries: &[String]) -> String {
    summaries.join("\n\n")
}

/// Default prompt templates, used when a client omits custom ones.
pub fn default_prompts() -> PromptSet {
    PromptSet {
        chunk_summary: "Summarize this conversation segment in 2-3 concise paragraphs. \
Focus on the main discussion points, decisions, and any contact, company, or deal \
details mentioned.\n\nTranscript:\n{text}\n\nSummary:"
            .to_string(),
        final_summary: "You are summarizing a meeting from the segment summaries below. \
Write a concise final summary (3-5 paragraphs) covering context, key discussion \
points, decisions, and next steps.\n\nSegment Summaries:\n{summaries_text}\n\nFinal Summary:"
            .to_string(),
        data_extraction: "Extract all mentioned contacts, companies, and deals from the \
meeting summaries below. Use null for anything not mentioned.\n\nSummaries:\n{summaries_text}"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    /// Scripted client: fails `failures` times, then echoes a fixed reply.
    struct FlakyLlm {
        failures: Mutex<usize>,
        reply: String,
    }

    #[async_trait]
    impl LlmClient for FlakyLlm {
        async fn generate(&self, _m: &str, _p: &str, _t: u32) -> crate::error::Result<String> {
            let mut left = self.failures.lock();
            if *left > 0 {
                *left -= 1;
                return Err(EngineError::LlmUnavailable("transient".into()));
            }
            Ok(self.reply.clone())
        }

        async fn generate_structured(
            &self,
            m: &str,
            p: &str,
            _s: &Value,
            t: u32,
        ) -> crate::error::Result<String> {
            self.generate(m, p, t).await
        }

        async fn list_models(&self) -> crate::error::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    fn summarizer(llm: Arc<dyn LlmClient>) -> MapReduceSummarizer {
        MapReduceSummarizer::new(
            llm,
            "test-model".to_string(),
            default_prompts(),
            TokenBudgets {
                chunk_summary: 300,
                final_summary: 1200,
                extraction: 2000,
            },
            Arc::new(Semaphore::new(2)),
        )
    }

    #[tokio::test]
    async fn map_retries_once_and_succeeds() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(1),
            reply: "chunk summary".into(),
        });
        let s = summarizer(llm);
        assert_eq!(s.map("some transcript text").await.unwrap(), "chunk summary");
    }

    #[tokio::test]
    async fn map_gives_up_after_second_failure() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(2),
            reply: "unreached".into(),
        });
        let s = summarizer(llm);
        assert!(s.map("text").await.is_err());
    }

    #[tokio::test]
    async fn map_skips_empty_chunks() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(99),
            reply: String::new(),
        });
        let s = summarizer(llm);
        assert_eq!(s.map("   ").await.unwrap(), "");
    }

    #[tokio::test]
    async fn extract_falls_back_to_empty_data() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(0),
            reply: "definitely not json".into(),
        });
        let s = summarizer(llm);
        let data = s.extract(&["summary one".to_string()]).await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn extract_parses_valid_structured_reply() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(0),
            reply: r#"{"contacts":[{"name":"Ana"}],"companies":[],"deals":[]}"#.into(),
        });
        let s = summarizer(llm);
        let data = s.extract(&["summary".to_string()]).await;
        assert_eq!(data.contacts.len(), 1);
    }

    #[tokio::test]
    async fn reduce_joins_summaries_in_order() {
        let llm = Arc::new(FlakyLlm {
            failures: Mutex::new(0),
            reply: "final".into(),
        });
        let s = summarizer(llm);
        let out = s
            .reduce(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(out, "final");
    }
}

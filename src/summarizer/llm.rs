//! Local LLM runtime clients.
//!
//! `OllamaClient` speaks the Ollama HTTP API on loopback: `/api/generate`
//! for completions (optionally schema-constrained via `format`) and
//! `/api/tags` for model discovery. `CannedLlm` is the dev-mode stand-in:
//! deterministic, instant, and forbidden in production.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{EngineError, Result};

/// Generation-service abstraction the summarizer runs against.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Plain completion, bounded by `max_tokens`.
    async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Schema-constrained completion; the response should be JSON matching
    /// `schema` but callers must still validate it.
    async fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
        max_tokens: u32,
    ) -> Result<String>;

    /// Models the runtime has locally.
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Cheap readiness probe for /start_session: runtime reachable and the
    /// model present.
    async fn ensure_model(&self, model: &str) -> Result<()> {
        let models = self.list_models().await?;
        let known = models
            .iter()
            .any(|m| m == model || m.starts_with(&format!("{model}:")));
        if known {
            Ok(())
        } else {
            Err(EngineError::LlmUnavailable(format!("model not found: {model}")))
        }
    }

    /// Download a model into the local runtime. Runtimes without a pull
    /// facility report unavailability.
    async fn pull_model(&self, model: &str) -> Result<()> {
        Err(EngineError::LlmUnavailable(format!(
            "this runtime cannot pull model {model}"
        )))
    }
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn generate_inner(&self, body: Value) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("LLM runtime unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::LlmUnavailable(format!(
                "LLM runtime returned {}",
                resp.status()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("malformed LLM response: {e}")))?;
        Ok(parsed.response.trim().to_string())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.generate_inner(json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": max_tokens,
                "temperature": 0.7,
                "top_k": 20,
                "top_p": 0.8,
            },
        }))
        .await
    }

    async fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
        max_tokens: u32,
    ) -> Result<String> {
        // temperature 0: extraction should be as deterministic as the
        // runtime allows.
        self.generate_inner(json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "format": schema,
            "options": {
                "num_predict": max_tokens,
                "temperature": 0.0,
            },
        }))
        .await
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        tracing::info!(model, "pulling LLM model");
        let url = format!("{}/api/pull", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "name": model, "stream": false }))
            // Model downloads run to minutes; override the client default.
            .timeout(Duration::from_secs(1800))
            .send()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("LLM runtime unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::LlmUnavailable(format!(
                "model pull failed with {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("LLM runtime unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::LlmUnavailable(format!(
                "LLM runtime returned {}",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::LlmUnavailable(format!("malformed tags response: {e}")))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

/// Deterministic dev-mode client: picks a canned summary by prompt hash and
/// returns empty structured data. Mirrors what a cooperative small model
/// would produce, without needing a runtime.
pub struct CannedLlm;

const CANNED_SUMMARIES: &[&str] = &[
    "The conversation covered portfolio positioning, current allocations, and near-term priorities. Both sides agreed on concrete follow-ups.",
    "Discussion focused on product fit, fee considerations, and the client's decision timeline. Several open questions were assigned owners.",
    "The call reviewed performance context, strategy preferences, and operational constraints. Next steps were confirmed before closing.",
    "Topics included mandate sizing, competing products already held, and the approval process on the client side. A follow-up meeting was proposed.",
];

#[async_trait]
impl LlmClient for CannedLlm {
    async fn generate(&self, _model: &str, prompt: &str, _max_tokens: u32) -> Result<String> {
        let mut hasher = DefaultHasher::new();
        prompt.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % CANNED_SUMMARIES.len();
        Ok(CANNED_SUMMARIES[idx].to_string())
    }

    async fn generate_structured(
        &self,
        _model: &str,
        _prompt: &str,
        _schema: &Value,
        _max_tokens: u32,
    ) -> Result<String> {
        Ok(r#"{"contacts": [], "companies": [], "deals": []}"#.to_string())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["canned-dev".to_string()])
    }

    async fn ensure_model(&self, _model: &str) -> Result<()> {
        Ok(())
    }

    async fn pull_model(&self, _model: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_llm_is_deterministic() {
        let llm = CannedLlm;
        let a = llm.generate("m", "same prompt", 100).await.unwrap();
        let b = llm.generate("m", "same prompt", 100).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn canned_llm_extraction_is_empty_data() {
        let llm = CannedLlm;
        let out = llm
            .generate_structured("m", "p", &serde_json::json!({}), 100)
            .await
            .unwrap();
        let data = crate::summarizer::schema::MeetingData::parse(&out).unwrap();
        assert!(data.is_empty());
    }
}

//! LLM client
//!
//! A thin chat-completions client: one user-role message in, the first
//! choice's text out. Transport failures, non-success statuses and malformed
//! payloads all surface as `InsightError::Llm`; the agents that narrate
//! results absorb those into in-band error strings so a dead endpoint never
//! aborts an analysis run.

use crate::config::AppConfig;
use crate::error::{InsightError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Pluggable completion backend.
///
/// The production backend is an HTTP chat-completions endpoint; tests and
/// offline runs inject a scripted backend instead.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Chat-completions backend over HTTP (OpenAI-compatible protocol).
pub struct ChatCompletionBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatCompletionBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionBackend {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": max_tokens,
            "temperature": 0.1
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| InsightError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InsightError::Llm(format!(
                "API error {}: {}",
                status.as_u16(),
                text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InsightError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InsightError::Llm("No content in LLM response".to_string()))?;

        Ok(content.trim().to_string())
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.model, self.base_url)
    }
}

/// Scripted backend returning queued responses in order, then a fixed
/// fallback. Used by tests and by offline runs where no endpoint is
/// reachable. Also counts how many completions were requested.
pub struct ScriptedBackend {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    fallback: String,
    calls: std::sync::atomic::AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().map(String::from).collect()),
            fallback: "(no response scripted)".to_string(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut queue = self.responses.lock().unwrap();
        Ok(queue.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Handle to the active completion backend.
///
/// Built once per process and cloned into the agents that need it, so the
/// underlying HTTP client is shared rather than re-created per call.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn LlmBackend>,
}

impl LlmClient {
    pub fn from_config(config: &AppConfig) -> Self {
        let (base_url, model) = config.active_endpoint();
        tracing::info!(model = model, base_url = base_url, "LLM client configured");
        Self {
            backend: Arc::new(ChatCompletionBackend::new(
                base_url,
                model,
                config.api_key.clone(),
            )),
        }
    }

    pub fn with_backend(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.backend.complete(prompt, max_tokens).await
    }

    /// Completion with failures absorbed into the returned text.
    ///
    /// Narration steps substitute the error message for the expected prose
    /// instead of propagating, so one dead call only blanks one field.
    pub async fn complete_or_error_text(&self, prompt: &str, max_tokens: u32) -> String {
        match self.backend.complete(prompt, max_tokens).await {
            Ok(text) => text,
            Err(e) => format!("Error calling model: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_backend_returns_in_order() {
        let backend = ScriptedBackend::new(vec!["first", "second"]);
        assert_eq!(backend.complete("a", 10).await.unwrap(), "first");
        assert_eq!(backend.complete("b", 10).await.unwrap(), "second");
        assert_eq!(backend.complete("c", 10).await.unwrap(), "(no response scripted)");
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_error_text_absorption() {
        struct FailingBackend;

        #[async_trait]
        impl LlmBackend for FailingBackend {
            async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
                Err(InsightError::Llm("connection refused".to_string()))
            }
            fn describe(&self) -> String {
                "failing".to_string()
            }
        }

        let client = LlmClient::with_backend(Arc::new(FailingBackend));
        let text = client.complete_or_error_text("hello", 10).await;
        assert!(text.contains("connection refused"));
    }
}

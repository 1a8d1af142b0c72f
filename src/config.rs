//! Application configuration
//!
//! Collects environment-driven settings into one explicit struct that is
//! passed to the components that need it, instead of having each module
//! read ambient env vars on its own.

use crate::error::{InsightError, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// Which LLM endpoint family to talk to.
///
/// Both modes speak the same chat-completions protocol; "local" simply
/// points the client at an OpenAI-compatible server running on this machine
/// (e.g. an Ollama instance) instead of the hosted endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    Cloud,
    Local,
}

impl FromStr for ModelMode {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cloud" => Ok(ModelMode::Cloud),
            "local" => Ok(ModelMode::Local),
            other => Err(InsightError::Config(format!("Unknown model mode: {}", other))),
        }
    }
}

/// Runtime configuration for the analysis engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: ModelMode,

    /// API key for the hosted endpoint (not required in local mode).
    pub api_key: Option<String>,
    pub cloud_base_url: String,
    pub cloud_model: String,
    pub local_base_url: String,
    pub local_model: String,

    /// Embeddings endpoint model name.
    pub embedding_model: String,

    pub output_dir: PathBuf,
    pub index_dir: PathBuf,
    pub memory_path: PathBuf,
    pub watch_dir: PathBuf,
    pub watch_interval_secs: u64,

    pub webhook_url: Option<String>,

    /// Nearest-neighbor rows returned per retrieval query.
    pub top_k: usize,
    /// Cap on rows returned from generated-analysis execution.
    pub max_result_rows: usize,
    /// Wall-clock budget for generated-analysis execution.
    pub exec_timeout_secs: u64,
}

impl AppConfig {
    /// Build a config from the environment, with sensible defaults for
    /// everything except credentials.
    pub fn from_env(mode: ModelMode) -> Self {
        let env = |key: &str| std::env::var(key).ok();

        Self {
            mode,
            api_key: env("INSIGHT_API_KEY").or_else(|| env("OPENAI_API_KEY")),
            cloud_base_url: env("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            cloud_model: env("INSIGHT_CLOUD_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
            local_base_url: env("INSIGHT_LOCAL_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
            local_model: env("INSIGHT_LOCAL_MODEL").unwrap_or_else(|| "phi".to_string()),
            embedding_model: env("INSIGHT_EMBED_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            output_dir: PathBuf::from(env("INSIGHT_OUTPUT_DIR").unwrap_or_else(|| "outputs".into())),
            index_dir: PathBuf::from(env("INSIGHT_INDEX_DIR").unwrap_or_else(|| "row_index".into())),
            memory_path: PathBuf::from(
                env("INSIGHT_MEMORY_PATH").unwrap_or_else(|| "memory/memory_log.json".into()),
            ),
            watch_dir: PathBuf::from(env("INSIGHT_WATCH_DIR").unwrap_or_else(|| "inbox".into())),
            watch_interval_secs: env("INSIGHT_WATCH_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            webhook_url: env("INSIGHT_WEBHOOK_URL"),
            top_k: env("INSIGHT_TOP_K").and_then(|v| v.parse().ok()).unwrap_or(5),
            max_result_rows: 100,
            exec_timeout_secs: 5,
        }
    }

    /// Base URL and model for the active mode.
    pub fn active_endpoint(&self) -> (&str, &str) {
        match self.mode {
            ModelMode::Cloud => (&self.cloud_base_url, &self.cloud_model),
            ModelMode::Local => (&self.local_base_url, &self.local_model),
        }
    }
}

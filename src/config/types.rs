//! Configuration types for the interpretation pipeline.
//!
//! This module contains the strongly-typed settings structures that are
//! deserialized from `settings.yaml`.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::ProcessOptions;

/// File locations.
///
/// Relative paths are resolved against the directory holding the settings
/// file.
#[derive(Debug, Clone, Deserialize)]
pub struct PathSettings {
    /// Root of the session workspaces.
    pub sessions_dir: PathBuf,
    /// The baseline configuration.
    pub baseline: PathBuf,
    /// The parametric field policy.
    pub parametric_fields: PathBuf,
    /// Payroll engine source files searched for patch plan locations.
    #[serde(default)]
    pub engine_sources: Vec<PathBuf>,
}

/// Document fetching.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// Base URL bare award codes resolve against.
    pub base_url: String,
    /// User agent sent with requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// API base URL (e.g. "https://api.openai.com/v1").
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// USD per 1000 prompt tokens.
    pub input_cost_per_1k: Decimal,
    /// USD per 1000 completion tokens.
    pub output_cost_per_1k: Decimal,
}

/// Which embedder to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible embeddings endpoint.
    Openai,
    /// Local feature hashing; no network, no cost.
    Hashing,
}

/// Embedding service.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    /// Which embedder to use.
    pub provider: EmbeddingProvider,
    /// API base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Vector dimensions for the hashing embedder.
    pub dimensions: usize,
    /// Texts per request.
    pub batch_size: usize,
    /// USD per 1000 input tokens.
    pub cost_per_1k: Decimal,
}

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

/// Chunking limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingSettings {
    /// Maximum characters of chunk text.
    pub max_chars: usize,
}

/// HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind: String,
}

/// Top-level settings file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// File locations.
    pub paths: PathSettings,
    /// Document fetching.
    pub fetch: FetchSettings,
    /// Chat completions.
    pub llm: LlmSettings,
    /// Embeddings.
    pub embedding: EmbeddingSettings,
    /// Retry policy.
    pub retry: RetrySettings,
    /// Chunking limits.
    pub chunking: ChunkingSettings,
    /// Default per-session options.
    pub defaults: ProcessOptions,
    /// HTTP server.
    pub server: ServerSettings,
}

impl Settings {
    /// Checks values serde cannot check.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.chunking.max_chars < 100 {
            return Err("chunking.max_chars must be at least 100".to_string());
        }
        if self.embedding.dimensions == 0 || self.embedding.batch_size == 0 {
            return Err("embedding.dimensions and embedding.batch_size must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.defaults.confidence_threshold) {
            return Err("defaults.confidence_threshold must be within [0, 1]".to_string());
        }
        if self.defaults.retrieval_k == 0 {
            return Err("defaults.retrieval_k must be positive".to_string());
        }
        Ok(())
    }
}

/// Reads an API key from the named environment variable.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

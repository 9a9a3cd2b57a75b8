//! Text embedding services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::config::EmbeddingSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::Budget;
use crate::models::SessionState;
use crate::retry::{RetryPolicy, with_backoff};

/// Embedding vector.
pub type Embedding = Vec<f32>;

/// Vectors for a batch of texts, plus what producing them cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingBatch {
    /// One vector per input text, in input order.
    pub vectors: Vec<Embedding>,
    /// USD cost.
    pub cost: Decimal,
}

/// Trait for text embedding services.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds texts in order.
    async fn embed_batch(&self, texts: &[String]) -> PipelineResult<EmbeddingBatch>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> PipelineResult<Embedding> {
        let batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::provider(self.model_name(), "no embedding returned"))
    }

    /// Model identifier.
    fn model_name(&self) -> &str;
}

/// Shared embedder type.
pub type SharedEmbedder = Arc<dyn Embedder>;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    #[serde(default)]
    prompt_tokens: u64,
}

/// OpenAI-compatible embeddings client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    cost_per_1k: Decimal,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// Creates an embedder from settings and an API key.
    pub fn new(
        settings: &EmbeddingSettings,
        api_key: String,
        retry: RetryPolicy,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::provider("embeddings", e.to_string()))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            batch_size: settings.batch_size.max(1),
            cost_per_1k: settings.cost_per_1k,
            retry,
        })
    }

    async fn request(&self, texts: &[String]) -> PipelineResult<EmbeddingBatch> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": &self.model,
                "input": texts,
                "dimensions": self.dimensions
            }))
            .send()
            .await
            .map_err(|e| PipelineError::provider("embeddings", e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::provider(
                "embeddings",
                format!("HTTP {}", response.status()),
            ));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::provider("embeddings", e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(PipelineError::provider(
                "embeddings",
                format!("expected {} vectors, got {}", texts.len(), parsed.data.len()),
            ));
        }

        let tokens = parsed.usage.map(|u| u.prompt_tokens).unwrap_or_default();
        // Sort by index to maintain order
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(EmbeddingBatch {
            vectors: data.into_iter().map(|d| d.embedding).collect(),
            cost: Decimal::from(tokens) * self.cost_per_1k / Decimal::from(1000),
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip_all, fields(model = %self.model, texts = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> PipelineResult<EmbeddingBatch> {
        let mut out = EmbeddingBatch::default();
        for batch in texts.chunks(self.batch_size) {
            let result =
                with_backoff(&self.retry, "embeddings", move || self.request(batch)).await?;
            out.vectors.extend(result.vectors);
            out.cost += result.cost;
        }
        debug!(cost = %out.cost, "Embedded batch");
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Local feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed into one of `dimensions`
/// buckets with a sign taken from the hash; the vector is L2-normalised.
/// Deterministic, free and offline, so it suits tests and dry runs.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of `dimensions` entries.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embeds one text synchronously.
    pub fn vector(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> PipelineResult<EmbeddingBatch> {
        Ok(EmbeddingBatch {
            vectors: texts.iter().map(|t| self.vector(t)).collect(),
            cost: Decimal::ZERO,
        })
    }

    fn model_name(&self) -> &str {
        "feature-hashing"
    }
}

/// An [`Embedder`] that checks the session budget before each batch and
/// charges it after.
pub struct MeteredEmbedder {
    inner: SharedEmbedder,
    budget: Arc<Budget>,
    stage: SessionState,
}

impl MeteredEmbedder {
    /// Wraps `inner`, charging costs to `stage`.
    pub fn new(inner: SharedEmbedder, budget: Arc<Budget>, stage: SessionState) -> Self {
        Self {
            inner,
            budget,
            stage,
        }
    }
}

#[async_trait]
impl Embedder for MeteredEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> PipelineResult<EmbeddingBatch> {
        self.budget.ensure_available()?;
        let batch = self.inner.embed_batch(texts).await?;
        self.budget.charge(self.stage, batch.cost)?;
        Ok(batch)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

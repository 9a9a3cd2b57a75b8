//! Chunk embedding and similarity retrieval.

mod embedder;
mod reference;
mod vector_index;

use std::sync::Arc;

use crate::config::{EmbeddingProvider, EmbeddingSettings, api_key_from_env};
use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

pub use embedder::{
    Embedder, Embedding, EmbeddingBatch, HashingEmbedder, MeteredEmbedder, OpenAiEmbedder,
    SharedEmbedder,
};
pub use reference::{ReferenceSource, reference_chunks, reference_key, reference_label};
pub use vector_index::{IndexOutcome, ScoredChunk, VectorIndex, fingerprint};

/// Builds the embedder the settings select.
pub fn embedder_from_settings(
    settings: &EmbeddingSettings,
    retry: RetryPolicy,
) -> PipelineResult<SharedEmbedder> {
    match settings.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(settings.dimensions))),
        EmbeddingProvider::Openai => {
            let api_key = api_key_from_env(&settings.api_key_env).ok_or_else(|| {
                PipelineError::provider(
                    "embeddings",
                    format!("environment variable {} is not set", settings.api_key_env),
                )
            })?;
            Ok(Arc::new(OpenAiEmbedder::new(settings, api_key, retry)?))
        }
    }
}

//! Per-session in-memory vector index.
//!
//! Each session owns its own index; indexing a session replaces whatever
//! was stored for it before, and sessions never see each other's chunks.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, PipelineResult};
use crate::models::Chunk;

use super::embedder::{Embedder, Embedding};

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// Cosine similarity.
    pub score: f32,
}

/// What an `index` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Chunks were embedded and stored.
    Indexed {
        /// Number of chunks stored.
        chunks: usize,
    },
    /// The stored content was identical; nothing was embedded.
    Unchanged,
}

struct SessionIndex {
    fingerprint: String,
    entries: Vec<(Chunk, Embedding)>,
}

/// Chunk index keyed by session id.
#[derive(Default)]
pub struct VectorIndex {
    sessions: RwLock<HashMap<String, SessionIndex>>,
}

/// Fingerprint of the rendered chunk sequence.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.id.as_bytes());
        hasher.update([0]);
        hasher.update(chunk.render().as_bytes());
        hasher.update([0]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl VectorIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Embeds and stores `chunks` for a session, replacing any prior index.
    ///
    /// Re-indexing content identical to what is stored is a no-op.
    #[instrument(skip_all, fields(session_id = %session_id, chunks = chunks.len()))]
    pub async fn index(
        &self,
        session_id: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> PipelineResult<IndexOutcome> {
        let fingerprint = fingerprint(chunks);
        {
            let sessions = self.sessions.read().await;
            if sessions
                .get(session_id)
                .is_some_and(|s| s.fingerprint == fingerprint)
            {
                debug!("Chunk content unchanged, keeping index");
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let texts: Vec<String> = chunks.iter().map(Chunk::render).collect();
        let batch = embedder.embed_batch(&texts).await?;
        if batch.vectors.len() != chunks.len() {
            return Err(PipelineError::provider(
                embedder.model_name(),
                format!(
                    "expected {} vectors, got {}",
                    chunks.len(),
                    batch.vectors.len()
                ),
            ));
        }

        let entries = chunks.iter().cloned().zip(batch.vectors).collect();
        self.sessions.write().await.insert(
            session_id.to_string(),
            SessionIndex {
                fingerprint,
                entries,
            },
        );
        info!(model = embedder.model_name(), "Session index built");
        Ok(IndexOutcome::Indexed {
            chunks: chunks.len(),
        })
    }

    /// Returns the `k` chunks most similar to `text`, ties broken by
    /// document order.
    pub async fn query(
        &self,
        session_id: &str,
        text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> PipelineResult<Vec<ScoredChunk>> {
        if !self.contains(session_id).await {
            return Err(PipelineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let query = embedder.embed(text).await?;

        let sessions = self.sessions.read().await;
        let Some(index) = sessions.get(session_id) else {
            return Err(PipelineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        };
        let mut scored: Vec<ScoredChunk> = index
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine(&query, vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Returns true if the session has an index.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Drops a session's index.
    pub async fn drop_session(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

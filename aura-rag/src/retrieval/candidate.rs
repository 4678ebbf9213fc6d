//! Over-fetching nearest-neighbour candidate retrieval.

use super::ScoredChunk;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::metadata::ChunkRecord;
use std::sync::Arc;

/// Embeds the query and fetches decoded candidates from the vector index.
#[derive(Clone)]
pub struct CandidateRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl CandidateRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `n` candidates, most similar first. A blank query returns none.
    pub async fn retrieve(&self, query: &str, n: usize) -> Result<Vec<ScoredChunk>> {
        if query.trim().is_empty() || n == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.query(&embedding, n).await?;
        tracing::debug!(requested = n, fetched = hits.len(), "Fetched candidates");

        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk::new(ChunkRecord::from_hit(hit.id, hit.text, &hit.metadata)))
            .collect())
    }
}

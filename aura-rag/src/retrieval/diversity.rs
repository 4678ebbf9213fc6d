//! Redundancy-aware selection with Maximal Marginal Relevance.

use super::ScoredChunk;
use crate::embeddings::{Embedder, cosine_similarity};
use async_trait::async_trait;
use std::sync::Arc;

/// Equal weighting of relevance and novelty.
const MMR_LAMBDA: f64 = 0.5;

/// Picks a bounded subset of candidates.
#[async_trait]
pub trait DiversitySelector: Send + Sync {
    /// At most `max_chunks` chunks, in selection order. Never fails.
    async fn select(&self, chunks: Vec<ScoredChunk>, max_chunks: usize) -> Vec<ScoredChunk>;

    fn name(&self) -> &str;
}

/// Keeps the first `max_chunks` chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncateSelector;

#[async_trait]
impl DiversitySelector for TruncateSelector {
    async fn select(&self, mut chunks: Vec<ScoredChunk>, max_chunks: usize) -> Vec<ScoredChunk> {
        chunks.truncate(max_chunks);
        chunks
    }

    fn name(&self) -> &str {
        "truncate"
    }
}

/// Greedy MMR over chunk embeddings.
///
/// Selection starts from the highest-quality chunk, then repeatedly takes the
/// candidate maximising `0.5 * quality + 0.5 * (1 - max cosine similarity to
/// any selected chunk)`. Ties go to the earliest candidate. Embedding
/// failures fall back to truncation.
pub struct MmrSelector {
    embedder: Arc<dyn Embedder>,
    diversity_threshold: f64,
}

impl MmrSelector {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            diversity_threshold: 0.7,
        }
    }

    /// Record the configured similarity threshold. It is reported in logs
    /// only; the MMR blend alone decides selection.
    pub fn with_threshold(mut self, diversity_threshold: f64) -> Self {
        self.diversity_threshold = diversity_threshold;
        self
    }

    async fn embed(&self, chunks: &[ScoredChunk]) -> Option<Vec<Vec<f32>>> {
        let texts: Vec<&str> = chunks.iter().map(ScoredChunk::text).collect();
        match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == chunks.len() => Some(embeddings),
            Ok(embeddings) => {
                tracing::warn!(
                    expected = chunks.len(),
                    received = embeddings.len(),
                    "Embedder returned wrong vector count, skipping diversity selection"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed, skipping diversity selection");
                None
            }
        }
    }
}

#[async_trait]
impl DiversitySelector for MmrSelector {
    async fn select(&self, mut chunks: Vec<ScoredChunk>, max_chunks: usize) -> Vec<ScoredChunk> {
        if chunks.len() <= max_chunks || max_chunks == 0 {
            chunks.truncate(max_chunks);
            return chunks;
        }
        let Some(embeddings) = self.embed(&chunks).await else {
            chunks.truncate(max_chunks);
            return chunks;
        };

        let order = mmr_order(&chunks, &embeddings, max_chunks);
        tracing::debug!(
            candidates = chunks.len(),
            selected = order.len(),
            threshold = self.diversity_threshold,
            "MMR selection"
        );

        let mut slots: Vec<Option<ScoredChunk>> = chunks.into_iter().map(Some).collect();
        order.into_iter().filter_map(|i| slots[i].take()).collect()
    }

    fn name(&self) -> &str {
        "mmr"
    }
}

/// Indices of the selected chunks, in selection order.
fn mmr_order(chunks: &[ScoredChunk], embeddings: &[Vec<f32>], max_chunks: usize) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..chunks.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(max_chunks);

    // Seed: absent quality counts as 0 here, unlike in the MMR relevance term.
    let seed_quality = |i: usize| chunks[i].record.quality_score.unwrap_or(0.0);
    let mut seed = 0;
    for i in 1..chunks.len() {
        if seed_quality(i) > seed_quality(seed) {
            seed = i;
        }
    }
    selected.push(seed);
    remaining.retain(|&i| i != seed);

    while selected.len() < max_chunks && !remaining.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &candidate) in remaining.iter().enumerate() {
            let closest = selected
                .iter()
                .map(|&s| f64::from(cosine_similarity(&embeddings[candidate], &embeddings[s])))
                .fold(f64::NEG_INFINITY, f64::max);
            let diversity = 1.0 - closest;
            let score = MMR_LAMBDA * chunks[candidate].quality() + (1.0 - MMR_LAMBDA) * diversity;
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((pos, score));
            }
        }
        let Some((pos, _)) = best else { break };
        selected.push(remaining.remove(pos));
    }
    selected
}

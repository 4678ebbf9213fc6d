//! End-to-end query pipeline.
//!
//! candidates → re-rank → prioritize → diverse selection → budgeted packing.
//! Strategies are fixed when the pipeline is built; no stage checks for
//! collaborator availability at query time.

use super::{
    CandidateRetriever, ContextCompressor, DiversitySelector, MmrSelector,
    QueryComplexityEstimator, Reranker, ScoredChunk, SourcePrioritizer, TruncateSelector,
    build_reranker,
};
use crate::config::{RagConfig, RetrievalConfig};
use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Per-query counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub candidates: usize,
    pub reranked: usize,
    pub selected: usize,
    pub chunks_used: usize,
    pub estimated_tokens: f64,
    pub token_window: usize,
    pub truncated: bool,
    pub retrieval_time_ms: u64,
}

/// Assembled context for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    /// Selected chunk texts separated by blank lines.
    pub context: String,
    /// Distinct source identifiers of the chunks in `context`, first use first.
    pub sources: Vec<String>,
    /// The chunks that contributed to `context`, in context order.
    pub chunks: Vec<ScoredChunk>,
    pub stats: RetrievalStats,
}

impl RetrievalContext {
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

/// Composition root for query-time retrieval.
pub struct RetrievalPipeline {
    retriever: CandidateRetriever,
    reranker: Arc<dyn Reranker>,
    prioritizer: SourcePrioritizer,
    selector: Arc<dyn DiversitySelector>,
    compressor: ContextCompressor,
    estimator: QueryComplexityEstimator,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn builder(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder {
            embedder,
            index,
            config: RagConfig::default(),
            reranker: None,
            selector: None,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn reranker_name(&self) -> &str {
        self.reranker.name()
    }

    pub fn selector_name(&self) -> &str {
        self.selector.name()
    }

    /// Retrieve and assemble context for `query`.
    ///
    /// Never fails: a blank query or an unavailable index yields an empty
    /// context, and every other stage degrades to its fallback.
    pub async fn retrieve(&self, query: &str) -> RetrievalContext {
        let started = Instant::now();
        let mut stats = RetrievalStats::default();
        if query.trim().is_empty() {
            tracing::debug!("Empty query, returning empty context");
            return RetrievalContext::default();
        }

        let candidates = match self
            .retriever
            .retrieve(query, self.config.candidate_count)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Candidate retrieval failed, returning empty context");
                Vec::new()
            }
        };
        stats.candidates = candidates.len();

        let reranked = self
            .reranker
            .rerank(query, candidates, self.config.rerank_top_k)
            .await;
        stats.reranked = reranked.len();

        let prioritized = self.prioritizer.prioritize(reranked);
        let selected = self
            .selector
            .select(prioritized, self.config.max_chunks)
            .await;
        stats.selected = selected.len();

        stats.token_window = self
            .estimator
            .estimate_window(query, self.config.base_window);
        let packed = self.compressor.pack(&selected, stats.token_window);
        stats.chunks_used = packed.included.len();
        stats.estimated_tokens = packed.estimated_tokens;
        stats.truncated = packed.truncated;

        let mut slots: Vec<Option<ScoredChunk>> = selected.into_iter().map(Some).collect();
        let chunks: Vec<ScoredChunk> = packed
            .included
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect();
        let sources = distinct_sources(&chunks);

        stats.retrieval_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            candidates = stats.candidates,
            reranked = stats.reranked,
            selected = stats.selected,
            used = stats.chunks_used,
            tokens = stats.estimated_tokens,
            window = stats.token_window,
            elapsed_ms = stats.retrieval_time_ms,
            "Retrieved context"
        );

        RetrievalContext {
            context: packed.text,
            sources,
            chunks,
            stats,
        }
    }
}

fn distinct_sources(chunks: &[ScoredChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .map(|c| c.record.source_id())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Builder for [`RetrievalPipeline`].
pub struct RetrievalPipelineBuilder {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: RagConfig,
    reranker: Option<Arc<dyn Reranker>>,
    selector: Option<Arc<dyn DiversitySelector>>,
}

impl RetrievalPipelineBuilder {
    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this reranker instead of the configured provider.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Use this selector instead of the configured strategy.
    pub fn with_selector(mut self, selector: Arc<dyn DiversitySelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn build(self) -> RetrievalPipeline {
        let Self {
            embedder,
            index,
            config,
            reranker,
            selector,
        } = self;

        let reranker = reranker.unwrap_or_else(|| build_reranker(&config.reranker));
        let selector = selector.unwrap_or_else(|| -> Arc<dyn DiversitySelector> {
            if config.retrieval.diversity_enabled {
                Arc::new(
                    MmrSelector::new(embedder.clone())
                        .with_threshold(config.retrieval.diversity_threshold),
                )
            } else {
                Arc::new(TruncateSelector)
            }
        });
        tracing::debug!(
            reranker = reranker.name(),
            selector = selector.name(),
            embedder = embedder.provider_name(),
            "Built retrieval pipeline"
        );

        RetrievalPipeline {
            retriever: CandidateRetriever::new(embedder, index),
            reranker,
            prioritizer: SourcePrioritizer::new(config.priority),
            selector,
            compressor: ContextCompressor,
            estimator: QueryComplexityEstimator,
            config: config.retrieval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use crate::error::{RagError, Result};
    use crate::index::{IndexHit, InMemoryVectorIndex};
    use crate::metadata::{FILENAME, FlatMetadata, IndexRecord, MetadataValue, QUALITY_SCORE};
    use async_trait::async_trait;

    struct DownIndex;

    #[async_trait]
    impl VectorIndex for DownIndex {
        async fn query(&self, _embedding: &[f32], _n: usize) -> Result<Vec<IndexHit>> {
            Err(RagError::index("connection refused"))
        }
        async fn add(&self, _records: Vec<IndexRecord>, _embeddings: Vec<Vec<f32>>) -> Result<()> {
            Err(RagError::index("connection refused"))
        }
        async fn delete(&self, _ids: &[String]) -> Result<usize> {
            Err(RagError::index("connection refused"))
        }
        async fn ids_for_document(&self, _document_id: &str) -> Result<Vec<String>> {
            Err(RagError::index("connection refused"))
        }
        async fn len(&self) -> usize {
            0
        }
    }

    async fn seeded_index(embedder: &LocalEmbedder) -> Arc<InMemoryVectorIndex> {
        let docs = [
            ("a", "alpha.md", "Solar panels convert sunlight into electricity.", 0.9),
            ("b", "alpha.md", "Solar farms need large open land areas.", 0.7),
            ("c", "beta.md", "Wind turbines generate electricity from moving air.", 0.8),
        ];
        let mut records = Vec::new();
        let mut texts = Vec::new();
        for (id, file, text, quality) in docs {
            let mut metadata = FlatMetadata::new();
            metadata.insert(FILENAME.into(), MetadataValue::Str(file.into()));
            metadata.insert(QUALITY_SCORE.into(), MetadataValue::Float(quality));
            records.push(IndexRecord {
                id: id.into(),
                text: text.into(),
                metadata,
            });
            texts.push(text);
        }
        let index = Arc::new(InMemoryVectorIndex::new());
        index
            .add(records, embedder.embed_batch(&texts).await.unwrap())
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_retrieve_assembles_context_and_sources() {
        let embedder = LocalEmbedder::new(128);
        let index = seeded_index(&embedder).await;
        let pipeline = RetrievalPipeline::builder(Arc::new(embedder), index).build();

        let result = pipeline.retrieve("solar electricity").await;
        assert_eq!(result.stats.candidates, 3);
        assert_eq!(result.stats.chunks_used, 3);
        assert_eq!(result.sources, vec!["alpha.md".to_string(), "beta.md".to_string()]);
        assert!(result.context.starts_with("Solar panels"));
        assert_eq!(result.context.matches("\n\n").count(), 2);
        assert_eq!(result.stats.token_window, 2400);
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty_context() {
        let embedder = LocalEmbedder::new(32);
        let index = seeded_index(&embedder).await;
        let pipeline = RetrievalPipeline::builder(Arc::new(embedder), index).build();
        let result = pipeline.retrieve("  ").await;
        assert!(result.is_empty());
        assert!(result.sources.is_empty());
    }

    #[tokio::test]
    async fn test_index_failure_yields_empty_context() {
        let pipeline =
            RetrievalPipeline::builder(Arc::new(LocalEmbedder::new(32)), Arc::new(DownIndex))
                .build();
        let result = pipeline.retrieve("anything at all").await;
        assert!(result.is_empty());
        assert_eq!(result.stats.candidates, 0);
    }

    #[test]
    fn test_builder_selects_strategies_from_config() {
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(16));
        let index: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());

        let default = RetrievalPipeline::builder(embedder.clone(), index.clone()).build();
        assert_eq!(default.reranker_name(), "passthrough");
        assert_eq!(default.selector_name(), "mmr");

        let mut config = RagConfig::default();
        config.retrieval.diversity_enabled = false;
        let plain = RetrievalPipeline::builder(embedder, index)
            .with_config(config)
            .build();
        assert_eq!(plain.selector_name(), "truncate");
    }
}

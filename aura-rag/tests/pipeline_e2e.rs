//! End-to-end chunking, ingestion and retrieval scenarios.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use aura_rag::chunk::SemanticChunker;
use aura_rag::config::{ChunkingConfig, RagConfig};
use aura_rag::embeddings::{Embedder, LocalEmbedder};
use aura_rag::error::{RagError, Result};
use aura_rag::index::InMemoryVectorIndex;
use aura_rag::ingest::DocumentIngestor;
use aura_rag::metadata::{ChunkRecord, DocumentInfo, FlatMetadata, MetadataValue, QUALITY_SCORE};
use aura_rag::retrieval::{
    ContextCompressor, CrossEncoderReranker, DiversitySelector, MmrSelector, RelevanceScorer,
    RetrievalPipeline, ScoredChunk, SourcePrioritizer,
};

const TWO_PARAGRAPHS: &str = "Machine learning is a branch of artificial intelligence that \
    builds systems which learn from data. Instead of following fixed rules, these systems \
    improve their performance as they see more examples over time.\n\n\
    Deep learning is a family of machine learning methods based on neural networks with \
    many layers. It has driven recent progress in speech recognition, computer vision and \
    language understanding across industry and academic research.";

/// Counts calls and scores passages by how often they mention "solar".
struct KeywordScorer {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl RelevanceScorer for KeywordScorer {
    async fn score(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::model_unavailable("cross-encoder weights missing"));
        }
        Ok(texts
            .iter()
            .map(|t| t.to_lowercase().matches("solar").count() as f32)
            .collect())
    }
}

/// Embeds normally for ingestion, then fails every later call.
struct FlakyEmbedder {
    inner: LocalEmbedder,
    remaining_ok: AtomicUsize,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let left = self.remaining_ok.load(Ordering::SeqCst);
        if left == 0 {
            return Err(RagError::model_unavailable("embedding service went away"));
        }
        self.remaining_ok.store(left - 1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn provider_name(&self) -> &str {
        "flaky"
    }
}

fn corpus() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (
            "solar-report",
            "research",
            "Solar panel efficiency improved this year. The solar array on the library roof \
             now supplies a third of the building load.",
        ),
        (
            "wind-proposal",
            "proposal",
            "A proposal to install wind turbines near the sports ground. Turbine noise and \
             bird safety still need study.",
        ),
        (
            "water-project",
            "project",
            "The water recycling project treats grey water for campus gardens. Treated water \
             quality is tested every week.",
        ),
    ]
}

async fn ingest_corpus(embedder: Arc<dyn Embedder>) -> Arc<InMemoryVectorIndex> {
    let index = Arc::new(InMemoryVectorIndex::new());
    let ingestor = DocumentIngestor::new(ChunkingConfig::default(), embedder, index.clone());
    for (id, category, text) in corpus() {
        let doc = DocumentInfo::new(id)
            .with_category(category)
            .with_filename(format!("{id}.txt"));
        ingestor.ingest_text(text, &doc).await.unwrap();
    }
    index
}

#[test]
fn short_document_is_a_single_chunk() {
    let chunks = SemanticChunker::new(ChunkingConfig::default()).chunk(TWO_PARAGRAPHS, "ml-intro");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.total_chunks, 1);
    assert!(!chunks[0].metadata.has_overlap);
    assert_eq!(chunks[0].metadata.sentence_count, 4);
}

#[tokio::test]
async fn diverse_selection_of_25_starts_with_best_quality() {
    let topics = ["solar", "wind", "water", "budget", "library"];
    let chunks: Vec<ScoredChunk> = (0..25)
        .map(|i| {
            let quality = ((i * 7) % 25) as f64 / 25.0;
            ScoredChunk::new(ChunkRecord {
                id: format!("chunk-{i}"),
                text: format!("{} notes number {i} for the annual review", topics[i % 5]),
                quality_score: Some(quality),
                ..Default::default()
            })
        })
        .collect();
    let best = chunks
        .iter()
        .max_by(|a, b| a.quality().total_cmp(&b.quality()))
        .map(|c| c.id().to_string())
        .unwrap();

    let selector = MmrSelector::new(Arc::new(LocalEmbedder::new(128)));
    let selected = selector.select(chunks, 10).await;
    assert_eq!(selected.len(), 10);
    assert_eq!(selected[0].id(), best);
}

#[tokio::test]
async fn query_ranks_relevant_research_first() {
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let index = ingest_corpus(embedder.clone()).await;
    let scorer = Arc::new(KeywordScorer {
        calls: AtomicUsize::new(0),
        fail: false,
    });

    let pipeline = RetrievalPipeline::builder(embedder, index)
        .with_reranker(Arc::new(CrossEncoderReranker::new(scorer.clone())))
        .build();
    let result = pipeline.retrieve("How efficient is the solar array?").await;

    assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.stats.candidates, 3);
    assert_eq!(result.sources[0], "solar-report.txt");
    assert!(result.context.starts_with("Solar panel efficiency"));
    assert_eq!(result.chunks[0].relevance_score, Some(2.0));
    assert_eq!(result.sources.len(), 3);
}

#[tokio::test]
async fn failing_models_still_produce_context() {
    let flaky = Arc::new(FlakyEmbedder {
        inner: LocalEmbedder::new(128),
        // Three documents to ingest plus one query embedding.
        remaining_ok: AtomicUsize::new(4),
    });
    let index = ingest_corpus(flaky.clone()).await;
    let scorer = Arc::new(KeywordScorer {
        calls: AtomicUsize::new(0),
        fail: true,
    });

    let mut config = RagConfig::default();
    config.retrieval.max_chunks = 2;
    let pipeline = RetrievalPipeline::builder(flaky, index)
        .with_config(config)
        .with_reranker(Arc::new(CrossEncoderReranker::new(scorer)))
        .build();

    // Query embedding succeeds; MMR embedding fails and falls back to truncation.
    let result = pipeline.retrieve("campus water and energy").await;
    assert_eq!(result.stats.candidates, 3);
    assert_eq!(result.stats.selected, 2);
    assert!(!result.context.is_empty());

    // Now the query embedding fails too: empty, but no error.
    let result = pipeline.retrieve("campus water and energy").await;
    assert!(result.is_empty());
}

#[tokio::test]
async fn removed_documents_are_not_retrieved() {
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(128));
    let index = Arc::new(InMemoryVectorIndex::new());
    let ingestor = DocumentIngestor::new(ChunkingConfig::default(), embedder.clone(), index.clone());
    for (id, category, text) in corpus() {
        let doc = DocumentInfo::new(id).with_category(category);
        ingestor.ingest_text(text, &doc).await.unwrap();
    }
    ingestor.remove_document("solar-report").await.unwrap();

    let pipeline = RetrievalPipeline::builder(embedder, index).build();
    let result = pipeline.retrieve("solar panel efficiency").await;
    assert!(!result.sources.contains(&"solar-report".to_string()));
    assert_eq!(result.stats.candidates, 2);
}

#[test]
fn non_numeric_stored_quality_is_ranked_as_default() {
    let chunks: Vec<ScoredChunk> = (0..60)
        .map(|i| {
            let quality = if i % 3 == 0 {
                MetadataValue::from("NaN")
            } else {
                MetadataValue::from(i as f64 / 60.0)
            };
            let metadata = FlatMetadata::from([(QUALITY_SCORE.to_string(), quality)]);
            ChunkRecord::from_hit(format!("c{i}"), format!("campus energy passage {i}"), &metadata)
        })
        .map(ScoredChunk::from)
        .collect();
    assert!(chunks.iter().step_by(3).all(|c| c.record.quality_score.is_none()));

    let prioritized = SourcePrioritizer::default().prioritize(chunks);
    assert_eq!(prioritized.len(), 60);
    assert_eq!(prioritized[0].id(), "c59");
    assert!(
        prioritized
            .windows(2)
            .all(|w| w[0].priority_score >= w[1].priority_score)
    );

    let packed = ContextCompressor.pack(&prioritized, 10_000);
    assert_eq!(packed.included.len(), 60);
    assert!(!packed.truncated);
}

//! Property-based tests for chunking, filtering and context assembly.

use std::sync::Arc;

use proptest::prelude::*;

use aura_rag::chunk::SemanticChunker;
use aura_rag::config::ChunkingConfig;
use aura_rag::embeddings::LocalEmbedder;
use aura_rag::filter::deduplicate;
use aura_rag::metadata::ChunkRecord;
use aura_rag::retrieval::compress::{ContextCompressor, estimate_tokens};
use aura_rag::retrieval::{DiversitySelector, MmrSelector, QueryComplexityEstimator, ScoredChunk};
use aura_rag::text;

fn sentence() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{2,9}", 3..16).prop_map(|words| {
        let mut s = words.join(" ");
        if let Some(first) = s.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        s.push('.');
        s
    })
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(sentence(), 1..40).prop_map(|sentences| sentences.join(" "))
}

fn window() -> impl Strategy<Value = (usize, usize)> {
    (10usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

// --- Chunking properties ---

proptest! {
    #[test]
    fn chunk_ids_are_deterministic(doc in document(), (size, overlap) in window()) {
        let chunker = SemanticChunker::new(ChunkingConfig::default().with_window(size, overlap));
        let first: Vec<String> = chunker.chunk(&doc, "doc").into_iter().map(|c| c.id).collect();
        let second: Vec<String> = chunker.chunk(&doc, "doc").into_iter().map(|c| c.id).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn chunks_cover_every_sentence(doc in document(), (size, overlap) in window()) {
        let chunker = SemanticChunker::new(ChunkingConfig::default().with_window(size, overlap));
        let chunks = chunker.chunk(&doc, "doc");
        let total = text::sentences(&text::preprocess(&doc)).len();

        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].metadata.sentence_start, 0);
        prop_assert_eq!(chunks.last().unwrap().metadata.sentence_end, total);
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0].metadata, &pair[1].metadata);
            prop_assert_eq!(next.sentence_start + next.overlap_sentences, prev.sentence_end);
        }
    }

    #[test]
    fn overlap_never_exceeds_budget(doc in document(), (size, overlap) in window()) {
        let chunker = SemanticChunker::new(ChunkingConfig::default().with_window(size, overlap));
        for chunk in chunker.chunk(&doc, "doc") {
            prop_assert!(chunk.metadata.overlap_tokens <= overlap);
            prop_assert_eq!(chunk.metadata.has_overlap, chunk.metadata.overlap_sentences > 0);
        }
    }

    #[test]
    fn quality_never_exceeds_one(doc in document(), (size, overlap) in window()) {
        let chunker = SemanticChunker::new(ChunkingConfig::default().with_window(size, overlap));
        let chunks = chunker.chunk(&doc, "doc");
        for chunk in &chunks {
            prop_assert!(chunk.quality_score <= 1.0);
            prop_assert_eq!(chunk.metadata.total_chunks, chunks.len());
        }
    }

    #[test]
    fn deduplicate_never_grows(doc in document(), threshold in 0.0f64..1.0) {
        let chunker = SemanticChunker::new(ChunkingConfig::default().with_window(30, 10));
        let chunks = chunker.chunk(&doc, "doc");
        let before = chunks.len();
        let mut doubled = chunks.clone();
        doubled.extend(chunks);
        let unique = deduplicate(doubled, threshold);
        prop_assert!(unique.len() <= before);
    }
}

// --- Selection and packing properties ---

fn scored_chunks() -> impl Strategy<Value = Vec<ScoredChunk>> {
    prop::collection::vec((sentence(), prop::option::of(0.0f64..1.0)), 0..30).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (text, quality))| {
                ScoredChunk::new(ChunkRecord {
                    id: format!("c{i}"),
                    text,
                    quality_score: quality,
                    ..Default::default()
                })
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn mmr_returns_min_of_budget_and_input(chunks in scored_chunks(), k in 0usize..15) {
        let selector = MmrSelector::new(Arc::new(LocalEmbedder::new(64)));
        let n = chunks.len();
        let selected = block_on(selector.select(chunks, k));
        prop_assert_eq!(selected.len(), k.min(n));

        let mut ids: Vec<&str> = selected.iter().map(ScoredChunk::id).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), selected.len());
    }

    #[test]
    fn compressed_context_fits_budget(chunks in scored_chunks(), max_tokens in 0usize..400) {
        let packed = ContextCompressor.pack(&chunks, max_tokens);
        prop_assert!(packed.estimated_tokens <= max_tokens as f64 + 1e-9);

        let recomputed: f64 = if packed.text.is_empty() {
            0.0
        } else {
            packed.text.split("\n\n").map(estimate_tokens).sum()
        };
        prop_assert!((recomputed - packed.estimated_tokens).abs() < 1e-6);
    }

    #[test]
    fn window_is_one_of_three_sizes(query in "[a-zA-Z_ ]{0,80}", base in 100usize..5000) {
        let window = QueryComplexityEstimator.estimate_window(&query, base);
        let expected = [(base as f64 * 0.8) as usize, base, (base as f64 * 1.5) as usize];
        prop_assert!(expected.contains(&window));
    }
}

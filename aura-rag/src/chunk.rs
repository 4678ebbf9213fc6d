//! Semantic, sentence-aligned document chunking.
//!
//! Text is split into sentences and packed greedily into windows of at most
//! `chunk_size` tokens. Each new window is seeded with the longest run of
//! trailing sentences from the previous one that fits in `overlap` tokens.
//! A single sentence longer than `chunk_size` is never cut.
//!
//! Chunks are assembled by a private batch builder and only handed out once
//! the batch is finalised. Callers that drop chunks afterwards (deduplication,
//! quality filtering) re-run [`finalize_chunks`] on what they keep so
//! `metadata.total_chunks` stays the document's real chunk count.

use crate::config::ChunkingConfig;
use crate::filter::{deduplicate, filter_low_quality};
use crate::structure::{DocumentStructure, Header, TextStructureAnalyzer};
use crate::text;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

const LENGTH_WEIGHT: f64 = 0.3;
const COMPLETENESS_WEIGHT: f64 = 0.3;
const POSITION_WEIGHT: f64 = 0.2;
const DENSITY_WEIGHT: f64 = 0.2;

const MAX_CHUNK_HEADERS: usize = 3;
const ID_PREFIX_CHARS: usize = 100;

/// A unit of retrievable document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id derived from document id, index and text prefix.
    pub id: String,
    pub document_id: String,
    /// Zero-based position within the document.
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    /// At most 1.0; may be negative for chunks far longer than the target.
    pub quality_score: f64,
    /// Lemmatised content words, most frequent first.
    pub keywords: Vec<String>,
    /// Up to three document headers sharing words with this chunk.
    pub headers: Vec<Header>,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_structure: DocumentStructure,
    pub sentence_count: usize,
    /// True when the chunk starts with sentences carried over from the previous chunk.
    pub has_overlap: bool,
    /// Number of leading sentences carried over from the previous chunk.
    pub overlap_sentences: usize,
    /// Token count of the carried-over sentences.
    pub overlap_tokens: usize,
    /// Index of the first sentence of this chunk in the document sentence sequence.
    pub sentence_start: usize,
    /// One past the index of the last sentence of this chunk.
    pub sentence_end: usize,
    pub total_chunks: usize,
}

/// Derive the stable chunk id used as the join key with the vector index.
pub fn chunk_id(document_id: &str, index: usize, text: &str) -> String {
    let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();
    let digest = Sha256::digest(format!("{document_id}_{index}_{prefix}").as_bytes());
    let hex = format!("{digest:x}");
    hex[..32].to_string()
}

/// Stamp `total_chunks` on every chunk of a document's final batch.
pub fn finalize_chunks(chunks: &mut [Chunk]) {
    let total = chunks.len();
    for chunk in chunks {
        chunk.metadata.total_chunks = total;
    }
}

/// Splits preprocessed text into overlapping, scored chunks.
#[derive(Debug, Clone, Default)]
pub struct SemanticChunker {
    config: ChunkingConfig,
    analyzer: TextStructureAnalyzer,
}

impl SemanticChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            analyzer: TextStructureAnalyzer,
        }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn target_size(&self) -> usize {
        self.config.chunk_size.max(1)
    }

    /// Chunk one document. Empty or whitespace-only input yields no chunks.
    pub fn chunk(&self, raw: &str, document_id: &str) -> Vec<Chunk> {
        let prepared = text::preprocess(raw);
        if prepared.is_empty() {
            return Vec::new();
        }

        let structure = self.analyzer.analyze(&prepared);
        let sentences = text::sentences(&prepared);
        if sentences.is_empty() {
            return Vec::new();
        }
        let tokens: Vec<usize> = sentences.iter().map(|s| text::token_count(s)).collect();

        let mut builder = ChunkBatchBuilder::new(self, document_id, &structure);
        let mut window: Vec<usize> = Vec::new();
        let mut window_tokens = 0usize;
        let mut carried = 0usize;

        for (i, &sentence_tokens) in tokens.iter().enumerate() {
            if window_tokens + sentence_tokens > self.target_size() && !window.is_empty() {
                builder.push(&sentences, &tokens, &window, carried);

                window = overlap_suffix(&window, &tokens, self.config.overlap);
                carried = window.len();
                window.push(i);
                window_tokens = window.iter().map(|&w| tokens[w]).sum();
            } else {
                window.push(i);
                window_tokens += sentence_tokens;
            }
        }
        if !window.is_empty() {
            builder.push(&sentences, &tokens, &window, carried);
        }

        let chunks = builder.finish();
        tracing::debug!(
            document_id,
            sentences = sentences.len(),
            chunks = chunks.len(),
            "Chunked document"
        );
        chunks
    }

    /// Composite quality of a chunk in relation to its position.
    ///
    /// Weighted sum of length fit (0.3), sentence completeness (0.3), position
    /// (0.2, only when `total > 1`) and lexical diversity (0.2), capped at 1.0.
    pub fn quality_score(&self, chunk_text: &str, position: usize, total: usize) -> f64 {
        if chunk_text.trim().is_empty() {
            return 0.0;
        }
        let target = self.target_size() as f64;
        let word_count = text::word_count(chunk_text) as f64;

        let mut score = (1.0 - (word_count - target).abs() / target) * LENGTH_WEIGHT;

        let sentences = text::sentences(chunk_text);
        if let (Some(first), Some(last)) = (sentences.first(), sentences.last()) {
            let complete =
                u8::from(text::ends_sentence(first)) + u8::from(text::ends_sentence(last));
            score += f64::from(complete) / 2.0 * COMPLETENESS_WEIGHT;
        }

        if total > 1 {
            let relative = 2.0 * position as f64 / (total - 1) as f64 - 1.0;
            score += (1.0 - relative.abs() * 0.5) * POSITION_WEIGHT;
        }

        let lowered = chunk_text.to_lowercase();
        let unique: HashSet<&str> = text::word_tokens(&lowered).into_iter().collect();
        let density = unique.len() as f64 / word_count.max(1.0);
        score += density.min(1.0) * DENSITY_WEIGHT;

        score.min(1.0)
    }

    /// Most frequent lemmatised content words of `chunk_text`.
    pub fn keywords(&self, chunk_text: &str) -> Vec<String> {
        let lowered = chunk_text.to_lowercase();
        let mut order: Vec<String> = Vec::new();
        let mut freq: HashMap<String, usize> = HashMap::new();

        for token in text::word_tokens(&lowered) {
            if !token.chars().all(char::is_alphanumeric)
                || token.chars().count() <= 2
                || text::is_stopword(token)
            {
                continue;
            }
            let lemma = text::lemmatize(token);
            let count = freq.entry(lemma.clone()).or_insert(0);
            if *count == 0 {
                order.push(lemma);
            }
            *count += 1;
        }

        // Stable sort keeps first-seen order among equal frequencies.
        order.sort_by(|a, b| freq[b].cmp(&freq[a]));
        order.truncate(self.config.max_keywords);
        order
    }

    fn relevant_headers(&self, chunk_text: &str, structure: &DocumentStructure) -> Vec<Header> {
        let lowered = chunk_text.to_lowercase();
        let chunk_words: HashSet<&str> = text::word_tokens(&lowered).into_iter().collect();

        structure
            .headers
            .iter()
            .filter(|header| {
                let header_lower = header.text.to_lowercase();
                text::word_tokens(&header_lower)
                    .into_iter()
                    .any(|w| chunk_words.contains(w))
            })
            .take(MAX_CHUNK_HEADERS)
            .cloned()
            .collect()
    }
}

/// Longest trailing run of `window` whose tokens fit in `budget`, in original order.
fn overlap_suffix(window: &[usize], tokens: &[usize], budget: usize) -> Vec<usize> {
    let mut used = 0usize;
    let mut start = window.len();
    for (pos, &sentence) in window.iter().enumerate().rev() {
        if used + tokens[sentence] > budget {
            break;
        }
        used += tokens[sentence];
        start = pos;
    }
    window[start..].to_vec()
}

/// Mutable per-document batch; `total_chunks` is only valid after `finish`.
struct ChunkBatchBuilder<'a> {
    chunker: &'a SemanticChunker,
    document_id: &'a str,
    structure: &'a DocumentStructure,
    chunks: Vec<Chunk>,
}

impl<'a> ChunkBatchBuilder<'a> {
    fn new(
        chunker: &'a SemanticChunker,
        document_id: &'a str,
        structure: &'a DocumentStructure,
    ) -> Self {
        Self {
            chunker,
            document_id,
            structure,
            chunks: Vec::new(),
        }
    }

    fn push(&mut self, sentences: &[String], tokens: &[usize], window: &[usize], carried: usize) {
        let index = self.chunks.len();
        let text = window
            .iter()
            .map(|&i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ");

        // Scored against the provisional count (index + 1); see DESIGN.md.
        let quality_score = self.chunker.quality_score(&text, index, index + 1);

        let overlap_tokens = window[..carried].iter().map(|&i| tokens[i]).sum();
        let sentence_start = window.first().copied().unwrap_or_default();
        let sentence_end = window.last().map(|&i| i + 1).unwrap_or_default();

        self.chunks.push(Chunk {
            id: chunk_id(self.document_id, index, &text),
            document_id: self.document_id.to_string(),
            index,
            word_count: text::word_count(&text),
            quality_score,
            keywords: self.chunker.keywords(&text),
            headers: self.chunker.relevant_headers(&text, self.structure),
            metadata: ChunkMetadata {
                document_structure: self.structure.clone(),
                sentence_count: window.len(),
                has_overlap: carried > 0,
                overlap_sentences: carried,
                overlap_tokens,
                sentence_start,
                sentence_end,
                total_chunks: 0,
            },
            text,
        });
    }

    fn finish(mut self) -> Vec<Chunk> {
        finalize_chunks(&mut self.chunks);
        self.chunks
    }
}

/// Chunk granularities produced by hierarchical chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// 200-token windows with 30 tokens of overlap, for detailed questions.
    Detailed,
    /// 300-token windows with 50 tokens of overlap.
    Standard,
    /// 500-token windows with 80 tokens of overlap, for overview questions.
    Summary,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Self::Detailed, Self::Standard, Self::Summary];

    /// `(chunk_size, overlap)` in tokens.
    pub fn window(self) -> (usize, usize) {
        match self {
            Self::Detailed => (200, 30),
            Self::Standard => (300, 50),
            Self::Summary => (500, 80),
        }
    }
}

/// Chunks of one document at every granularity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HierarchicalChunks {
    pub detailed: Vec<Chunk>,
    pub standard: Vec<Chunk>,
    pub summary: Vec<Chunk>,
}

impl HierarchicalChunks {
    pub fn get(&self, granularity: Granularity) -> &[Chunk] {
        match granularity {
            Granularity::Detailed => &self.detailed,
            Granularity::Standard => &self.standard,
            Granularity::Summary => &self.summary,
        }
    }
}

/// Chunk a document at all three granularities, deduplicating and
/// quality-filtering each level with the thresholds of `base`.
pub fn chunk_hierarchical(
    raw: &str,
    document_id: &str,
    base: &ChunkingConfig,
) -> HierarchicalChunks {
    let level = |granularity: Granularity| {
        let (size, overlap) = granularity.window();
        let config = base.with_window(size, overlap);
        let chunks = SemanticChunker::new(config.clone()).chunk(raw, document_id);
        let unique = deduplicate(chunks, config.dedup_threshold);
        let mut kept = filter_low_quality(unique, config.quality_threshold);
        finalize_chunks(&mut kept);
        kept
    };

    HierarchicalChunks {
        detailed: level(Granularity::Detailed),
        standard: level(Granularity::Standard),
        summary: level(Granularity::Summary),
    }
}

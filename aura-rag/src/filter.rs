//! Post-chunking deduplication and quality filtering.

use crate::chunk::Chunk;
use std::collections::HashSet;

/// Words of a chunk prefix compared during deduplication.
const DEDUP_PREFIX_WORDS: usize = 50;

/// Drop chunks whose opening words nearly repeat an already accepted chunk.
///
/// Compares the first 50 punctuation-stripped, lowercased words of each chunk
/// against every accepted chunk by Jaccard similarity over word sets; a chunk
/// is dropped when any similarity exceeds `threshold`. Order is preserved.
pub fn deduplicate(chunks: Vec<Chunk>, threshold: f64) -> Vec<Chunk> {
    if chunks.len() <= 1 {
        return chunks;
    }
    let before = chunks.len();
    let mut accepted: Vec<HashSet<String>> = Vec::new();
    let mut unique = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let words = prefix_words(&chunk.text);
        let duplicate = accepted
            .iter()
            .any(|seen| jaccard(&words, seen) > threshold);
        if !duplicate {
            accepted.push(words);
            unique.push(chunk);
        }
    }

    if unique.len() < before {
        tracing::debug!(
            removed = before - unique.len(),
            kept = unique.len(),
            "Removed near-duplicate chunks"
        );
    }
    unique
}

/// Keep chunks whose quality score is at least `threshold`, in order.
pub fn filter_low_quality(chunks: Vec<Chunk>, threshold: f64) -> Vec<Chunk> {
    chunks
        .into_iter()
        .filter(|c| c.quality_score >= threshold)
        .collect()
}

fn prefix_words(text: &str) -> HashSet<String> {
    let stripped: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped
        .split_whitespace()
        .take(DEDUP_PREFIX_WORDS)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two word sets; 0.0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

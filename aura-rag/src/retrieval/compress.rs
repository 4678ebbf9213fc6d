//! Token-budgeted context packing.

use super::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Estimated tokens per whitespace-separated word.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Overflow chunks are only truncated into the context when more than this
/// many estimated tokens of budget remain.
const MIN_TRUNCATION_TOKENS: f64 = 50.0;

const PART_SEPARATOR: &str = "\n\n";

/// Estimated token count of `text`: words × 1.3.
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * TOKENS_PER_WORD
}

/// Result of packing chunks into a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedContext {
    /// Chunk texts joined by blank lines.
    pub text: String,
    /// Input positions of the chunks that contributed text, in context order.
    pub included: Vec<usize>,
    pub estimated_tokens: f64,
    /// True when the last included chunk was cut to fit.
    pub truncated: bool,
}

/// Packs whole chunks into a token budget, best first.
///
/// Chunks are ordered by `quality × relevance` (0.5 and 1.0 when absent).
/// The first chunk that would overflow is word-truncated into the remaining
/// budget if more than 50 tokens remain, otherwise dropped; packing stops
/// there either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextCompressor;

impl ContextCompressor {
    pub fn compress(&self, chunks: &[ScoredChunk], max_tokens: usize) -> String {
        self.pack(chunks, max_tokens).text
    }

    pub fn pack(&self, chunks: &[ScoredChunk], max_tokens: usize) -> CompressedContext {
        if chunks.is_empty() {
            return CompressedContext::default();
        }
        let budget = max_tokens as f64;

        let mut order: Vec<usize> = (0..chunks.len()).collect();
        order.sort_by(|&a, &b| sort_key(&chunks[b]).total_cmp(&sort_key(&chunks[a])));

        let mut parts: Vec<String> = Vec::new();
        let mut packed = CompressedContext::default();

        for i in order {
            let text = chunks[i].text();
            let estimated = estimate_tokens(text);

            if packed.estimated_tokens + estimated > budget {
                let remaining = budget - packed.estimated_tokens;
                if remaining > MIN_TRUNCATION_TOKENS {
                    let keep = (remaining / TOKENS_PER_WORD).floor() as usize;
                    let truncated = text.split_whitespace().take(keep).collect::<Vec<_>>().join(" ");
                    packed.estimated_tokens += estimate_tokens(&truncated);
                    parts.push(truncated);
                    packed.included.push(i);
                    packed.truncated = true;
                }
                break;
            }

            parts.push(text.to_string());
            packed.included.push(i);
            packed.estimated_tokens += estimated;
        }

        packed.text = parts.join(PART_SEPARATOR);
        tracing::debug!(
            input = chunks.len(),
            included = packed.included.len(),
            tokens = packed.estimated_tokens,
            budget = max_tokens,
            truncated = packed.truncated,
            "Packed context"
        );
        packed
    }
}

/// Quality times relevance; a `NaN` product sorts last.
fn sort_key(chunk: &ScoredChunk) -> f64 {
    let key = chunk.quality() * chunk.relevance_score.map_or(1.0, f64::from);
    if key.is_nan() { f64::NEG_INFINITY } else { key }
}

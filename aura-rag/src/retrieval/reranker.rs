//! Cross-encoder re-ranking of retrieved candidates.

use super::ScoredChunk;
use crate::config::RerankerConfig;
use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Pairwise (query, passage) relevance model.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// One logit per text, in input order; higher is more relevant.
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>>;
}

/// Reorders candidates by relevance to the query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// At most `top_k` chunks, best first. Never fails.
    async fn rerank(&self, query: &str, chunks: Vec<ScoredChunk>, top_k: usize)
    -> Vec<ScoredChunk>;

    fn name(&self) -> &str;
}

/// Keeps the incoming order and truncates to `top_k`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut chunks: Vec<ScoredChunk>,
        top_k: usize,
    ) -> Vec<ScoredChunk> {
        chunks.truncate(top_k);
        chunks
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Sorts candidates by cross-encoder logit.
///
/// Fails open: if the scorer errors or returns the wrong number of scores,
/// the first `top_k` chunks are returned in their original order.
pub struct CrossEncoderReranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl CrossEncoderReranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        query: &str,
        mut chunks: Vec<ScoredChunk>,
        top_k: usize,
    ) -> Vec<ScoredChunk> {
        if chunks.is_empty() {
            return chunks;
        }

        let result = {
            let texts: Vec<&str> = chunks.iter().map(ScoredChunk::text).collect();
            self.scorer.score(query, &texts).await
        };
        let scores = match result {
            Ok(scores) if scores.len() == chunks.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    expected = chunks.len(),
                    received = scores.len(),
                    "Relevance scorer returned wrong score count, keeping retrieval order"
                );
                chunks.truncate(top_k);
                return chunks;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Relevance scoring failed, keeping retrieval order");
                chunks.truncate(top_k);
                return chunks;
            }
        };

        for (chunk, score) in chunks.iter_mut().zip(scores) {
            chunk.relevance_score = Some(score);
        }
        // A NaN score from the scorer ranks below every real score.
        let key = |c: &ScoredChunk| {
            c.relevance_score
                .filter(|s| !s.is_nan())
                .unwrap_or(f32::NEG_INFINITY)
        };
        chunks.sort_by(|a, b| key(b).total_cmp(&key(a)));
        chunks.truncate(top_k);
        chunks
    }

    fn name(&self) -> &str {
        "cross-encoder"
    }
}

/// Scores pairs with a text-embeddings-inference server's `/rerank` endpoint.
pub struct TeiRelevanceScorer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TeiRank {
    index: usize,
    score: f32,
}

impl TeiRelevanceScorer {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:8080".into()),
        }
    }
}

#[async_trait]
impl RelevanceScorer for TeiRelevanceScorer {
    async fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/rerank", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "query": query,
            "texts": texts,
            "raw_scores": true,
            "truncate": true,
        });

        let ranks: Vec<TeiRank> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::model_unavailable(format!("reranker: {e}")))?
            .error_for_status()?
            .json()
            .await?;

        // The server answers sorted by score; put scores back in input order.
        let mut scores: Vec<Option<f32>> = vec![None; texts.len()];
        for rank in ranks {
            if let Some(slot) = scores.get_mut(rank.index) {
                *slot = Some(rank.score);
            }
        }
        scores
            .into_iter()
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| RagError::model_unavailable("reranker omitted some passages"))
    }
}

/// Choose the reranker named by configuration; unknown names pass through.
pub fn build_reranker(config: &RerankerConfig) -> Arc<dyn Reranker> {
    match config.provider.as_str() {
        "tei" => Arc::new(CrossEncoderReranker::new(Arc::new(TeiRelevanceScorer::new(
            config.base_url.clone(),
        )))),
        "none" => Arc::new(PassthroughReranker),
        other => {
            tracing::warn!(provider = other, "Unknown reranker provider, re-ranking disabled");
            Arc::new(PassthroughReranker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::{ids, scored};

    /// Scores each text by its length, or fails on demand.
    struct ScriptedScorer {
        fail: bool,
        drop_last: bool,
    }

    #[async_trait]
    impl RelevanceScorer for ScriptedScorer {
        async fn score(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
            if self.fail {
                return Err(RagError::model_unavailable("offline"));
            }
            let mut scores: Vec<f32> = texts.iter().map(|t| t.len() as f32).collect();
            if self.drop_last {
                scores.pop();
            }
            Ok(scores)
        }
    }

    fn reranker(fail: bool, drop_last: bool) -> CrossEncoderReranker {
        CrossEncoderReranker::new(Arc::new(ScriptedScorer { fail, drop_last }))
    }

    fn candidates() -> Vec<ScoredChunk> {
        vec![
            scored("short", "ab", None),
            scored("long", "abcdefgh", None),
            scored("mid", "abcd", None),
        ]
    }

    #[tokio::test]
    async fn test_sorts_by_score_and_truncates() {
        let out = reranker(false, false).rerank("q", candidates(), 2).await;
        assert_eq!(ids(&out), vec!["long", "mid"]);
        assert_eq!(out[0].relevance_score, Some(8.0));
    }

    #[tokio::test]
    async fn test_scorer_failure_fails_open() {
        let out = reranker(true, false).rerank("q", candidates(), 2).await;
        assert_eq!(ids(&out), vec!["short", "long"]);
        assert!(out.iter().all(|c| c.relevance_score.is_none()));
    }

    #[tokio::test]
    async fn test_score_count_mismatch_fails_open() {
        let out = reranker(false, true).rerank("q", candidates(), 5).await;
        assert_eq!(ids(&out), vec!["short", "long", "mid"]);
    }

    /// Scores by length but returns NaN for texts containing "?".
    struct NanScorer;

    #[async_trait]
    impl RelevanceScorer for NanScorer {
        async fn score(&self, _query: &str, texts: &[&str]) -> Result<Vec<f32>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains('?') { f32::NAN } else { t.len() as f32 })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_nan_scores_rank_last() {
        let mut chunks = candidates();
        chunks.insert(1, scored("odd", "??", None));
        let out = CrossEncoderReranker::new(Arc::new(NanScorer))
            .rerank("q", chunks, 4)
            .await;
        assert_eq!(ids(&out), vec!["long", "mid", "short", "odd"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(reranker(false, false).rerank("q", Vec::new(), 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_truncates() {
        let out = PassthroughReranker.rerank("q", candidates(), 1).await;
        assert_eq!(ids(&out), vec!["short"]);
    }

    #[test]
    fn test_build_reranker_by_provider() {
        let tei = RerankerConfig {
            provider: "tei".into(),
            ..Default::default()
        };
        assert_eq!(build_reranker(&tei).name(), "cross-encoder");
        assert_eq!(build_reranker(&RerankerConfig::default()).name(), "passthrough");
        let odd = RerankerConfig {
            provider: "quantum".into(),
            ..Default::default()
        };
        assert_eq!(build_reranker(&odd).name(), "passthrough");
    }
}

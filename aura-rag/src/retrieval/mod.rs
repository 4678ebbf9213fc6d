//! Query-time retrieval and context assembly.
//!
//! Every stage is fail-open: a collaborator failure is logged and the stage
//! falls back to passing its input through, so a query always produces a
//! (possibly degraded) context.

pub mod candidate;
pub mod complexity;
pub mod compress;
pub mod diversity;
pub mod pipeline;
pub mod priority;
pub mod reranker;

use crate::metadata::ChunkRecord;
use serde::{Deserialize, Serialize};

/// Quality assumed for chunks that carry none.
pub const DEFAULT_QUALITY: f64 = 0.5;

/// A retrieved chunk plus the scores attached to it during one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    /// Cross-encoder logit; unbounded, higher is more relevant.
    pub relevance_score: Option<f32>,
    /// Weighted recency/authority/quality composite.
    pub priority_score: Option<f64>,
}

impl ScoredChunk {
    pub fn new(record: ChunkRecord) -> Self {
        Self {
            record,
            relevance_score: None,
            priority_score: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn text(&self) -> &str {
        &self.record.text
    }

    /// Stored quality score, or 0.5 when absent.
    pub fn quality(&self) -> f64 {
        self.record.quality_score.unwrap_or(DEFAULT_QUALITY)
    }
}

impl From<ChunkRecord> for ScoredChunk {
    fn from(record: ChunkRecord) -> Self {
        Self::new(record)
    }
}

pub use candidate::CandidateRetriever;
pub use complexity::QueryComplexityEstimator;
pub use compress::{CompressedContext, ContextCompressor};
pub use diversity::{DiversitySelector, MmrSelector, TruncateSelector};
pub use pipeline::{RetrievalContext, RetrievalPipeline, RetrievalPipelineBuilder, RetrievalStats};
pub use priority::{SourcePrioritizer, authority_score};
pub use reranker::{
    CrossEncoderReranker, PassthroughReranker, RelevanceScorer, Reranker, TeiRelevanceScorer,
    build_reranker,
};

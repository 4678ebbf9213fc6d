//! # aura-rag — Retrieval and Context Assembly
//!
//! Turns documents into scored, sentence-aligned chunks and, at query time,
//! turns a vector index into a bounded context for answer generation.
//!
//! ## Indexing
//! 1. **Chunking** — header detection, sentence windows with overlap, quality
//!    scores and keywords ([`chunk`], [`structure`], [`text`])
//! 2. **Filtering** — near-duplicate removal and quality gating ([`filter`])
//! 3. **Ingestion** — flattened metadata, embeddings, index writes
//!    ([`metadata`], [`embeddings`], [`index`], [`ingest`])
//!
//! ## Retrieval
//! candidates → re-rank → prioritize → diverse selection → budgeted packing
//! ([`retrieval`]). Every query-time stage is fail-open.

// Foundation
pub mod config;
pub mod error;

// Document processing
pub mod chunk;
pub mod filter;
pub mod structure;
pub mod text;

// Index boundary
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod metadata;

// Query time
pub mod retrieval;

// Re-exports
pub use chunk::{
    Chunk, ChunkMetadata, Granularity, HierarchicalChunks, SemanticChunker, chunk_hierarchical,
    finalize_chunks,
};
pub use config::{RagConfig, load_config};
pub use embeddings::{Embedder, LocalEmbedder, OllamaEmbedder, cosine_similarity, create_embedder};
pub use error::{RagError, Result};
pub use filter::{deduplicate, filter_low_quality};
pub use index::{IndexHit, InMemoryVectorIndex, VectorIndex};
pub use ingest::{DocumentIngestor, IngestReport};
pub use metadata::{ChunkRecord, DocumentInfo, IndexRecord};
pub use retrieval::{RetrievalContext, RetrievalPipeline, RetrievalStats, ScoredChunk};
pub use structure::{DocumentStructure, Header, TextStructureAnalyzer};

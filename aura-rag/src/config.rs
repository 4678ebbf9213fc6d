//! Configuration for chunking and retrieval.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Document chunking configuration.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Query-time retrieval configuration.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Source prioritization weights.
    #[serde(default)]
    pub priority: PriorityConfig,
    /// Embedding provider configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Cross-encoder reranker configuration.
    #[serde(default)]
    pub reranker: RerankerConfig,
}

/// Semantic chunking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Maximum tokens carried over from the previous chunk.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// Jaccard similarity above which a chunk counts as a duplicate.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Minimum quality score a chunk needs to be kept.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Maximum keywords extracted per chunk.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            dedup_threshold: default_dedup_threshold(),
            quality_threshold: default_quality_threshold(),
            max_keywords: default_max_keywords(),
        }
    }
}

impl ChunkingConfig {
    /// Same thresholds, different window.
    pub fn with_window(&self, chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..self.clone()
        }
    }
}

fn default_chunk_size() -> usize {
    300
}

fn default_overlap() -> usize {
    50
}

fn default_dedup_threshold() -> f64 {
    0.85
}

fn default_quality_threshold() -> f64 {
    0.3
}

fn default_max_keywords() -> usize {
    10
}

/// Query-time retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of nearest neighbours fetched from the vector index.
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,
    /// Number of candidates kept after cross-encoder re-ranking.
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
    /// Maximum chunks kept by diverse selection.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    /// Accepted for compatibility; MMR blending is the only diversity mechanism.
    #[serde(default = "default_diversity_threshold")]
    pub diversity_threshold: f64,
    /// Use MMR selection (requires an embedder).
    #[serde(default = "default_true")]
    pub diversity_enabled: bool,
    /// Token budget before the query-complexity multiplier is applied.
    #[serde(default = "default_base_window")]
    pub base_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_count: default_candidate_count(),
            rerank_top_k: default_rerank_top_k(),
            max_chunks: default_max_chunks(),
            diversity_threshold: default_diversity_threshold(),
            diversity_enabled: true,
            base_window: default_base_window(),
        }
    }
}

fn default_candidate_count() -> usize {
    40
}

fn default_rerank_top_k() -> usize {
    20
}

fn default_max_chunks() -> usize {
    10
}

fn default_diversity_threshold() -> f64 {
    0.7
}

fn default_base_window() -> usize {
    3000
}

/// Weights of the composite source priority score.
///
/// The weights are not required to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_authority_weight")]
    pub authority_weight: f64,
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            recency_weight: default_recency_weight(),
            authority_weight: default_authority_weight(),
            quality_weight: default_quality_weight(),
        }
    }
}

fn default_recency_weight() -> f64 {
    0.3
}

fn default_authority_weight() -> f64 {
    0.4
}

fn default_quality_weight() -> f64 {
    0.3
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default) or "ollama".
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding dimensions for the local provider.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Base URL for HTTP providers.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dimensions: default_dimensions(),
            base_url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".into()
}

fn default_dimensions() -> usize {
    256
}

/// Cross-encoder reranker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Provider name: "none" (default, passthrough) or "tei".
    #[serde(default = "default_reranker_provider")]
    pub provider: String,
    /// Base URL of the reranking server.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name, informational only.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_reranker_provider(),
            base_url: None,
            model: None,
        }
    }
}

fn default_reranker_provider() -> String {
    "none".into()
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `AURA_`)
/// 3. Workspace-local config (`.aura/config.toml`)
/// 4. User config (`~/.config/aura/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&RagConfig>,
) -> Result<RagConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RagConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "aura", "aura") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".aura").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // AURA_RETRIEVAL__MAX_CHUNKS, AURA_CHUNKING__CHUNK_SIZE, ...
    figment = figment.merge(Env::prefixed("AURA_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

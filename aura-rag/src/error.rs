//! Error types for the aura-rag crate.
//!
//! Query-time stages never return these to their callers: they log the error
//! and take their fallback path. Errors surface only from collaborator
//! primitives (embedder, scorer, index), ingestion and configuration loading.

use thiserror::Error;

/// Top-level error type for retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Failed to decode metadata field '{field}': {message}")]
    Decode { field: String, message: String },

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RagError {
    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    pub fn decode(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RagError>;

//! Nearest-neighbour vector index boundary.

use crate::embeddings::cosine_similarity;
use crate::error::{RagError, Result};
use crate::metadata::{DOCUMENT_ID, FlatMetadata, IndexRecord, MetadataValue};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub text: String,
    pub metadata: FlatMetadata,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// A similarity-searchable store of chunk embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `n` records most similar to `embedding`, best first.
    async fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<IndexHit>>;

    /// Insert records, replacing any existing record with the same id.
    async fn add(&self, records: Vec<IndexRecord>, embeddings: Vec<Vec<f32>>) -> Result<()>;

    /// Remove records by id, returning how many were present.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Ids of every record whose `document_id` metadata equals `document_id`.
    async fn ids_for_document(&self, document_id: &str) -> Result<Vec<String>>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Debug, Clone)]
struct Entry {
    record: IndexRecord,
    embedding: Vec<f32>,
}

/// Brute-force cosine index held in memory.
///
/// Ties keep insertion order. Readers share the lock, so concurrent queries
/// never block each other.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<IndexHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().await;
        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .map(|e| (cosine_similarity(embedding, &e.embedding), e))
            .collect();
        // NaN similarities rank last.
        let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
        scored.sort_by(|a, b| key(b.0).total_cmp(&key(a.0)));

        Ok(scored
            .into_iter()
            .take(n)
            .map(|(score, e)| IndexHit {
                id: e.record.id.clone(),
                text: e.record.text.clone(),
                metadata: e.record.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn add(&self, records: Vec<IndexRecord>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if records.len() != embeddings.len() {
            return Err(RagError::index(format!(
                "{} records but {} embeddings",
                records.len(),
                embeddings.len()
            )));
        }
        let mut entries = self.entries.write().await;
        for (record, embedding) in records.into_iter().zip(embeddings) {
            let entry = Entry { record, embedding };
            match entries.iter_mut().find(|e| e.record.id == entry.record.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !ids.contains(&e.record.id));
        Ok(before - entries.len())
    }

    async fn ids_for_document(&self, document_id: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| {
                matches!(
                    e.record.metadata.get(DOCUMENT_ID),
                    Some(MetadataValue::Str(id)) if id == document_id
                )
            })
            .map(|e| e.record.id.clone())
            .collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

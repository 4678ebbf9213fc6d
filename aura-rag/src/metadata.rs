//! Flattened chunk metadata exchanged with the vector index.
//!
//! Vector stores only hold scalar metadata, so structured chunk fields are
//! serialised on the way in (header lists and document structure as JSON,
//! keywords comma-joined) and decoded on the way out. A field that fails to
//! decode resets to its empty value and is logged; it never fails the record.

use crate::chunk::Chunk;
use crate::error::{RagError, Result};
use crate::structure::{DocumentStructure, Header};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DOCUMENT_ID: &str = "document_id";
pub const CHUNK_INDEX: &str = "chunk_index";
pub const WORD_COUNT: &str = "word_count";
pub const QUALITY_SCORE: &str = "quality_score";
pub const KEYWORDS: &str = "keywords";
pub const HEADERS: &str = "headers";
pub const DOCUMENT_STRUCTURE: &str = "document_structure";
pub const SENTENCE_COUNT: &str = "sentence_count";
pub const HAS_OVERLAP: &str = "has_overlap";
pub const TOTAL_CHUNKS: &str = "total_chunks";
pub const CATEGORY: &str = "category";
pub const DEPARTMENT: &str = "department";
pub const FILENAME: &str = "filename";
pub const CREATED_AT: &str = "created_at";

/// A scalar metadata value as stored by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type FlatMetadata = BTreeMap<String, MetadataValue>;

/// Document-level attributes attached to every chunk when it is indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub filename: Option<String>,
    /// Document category, used for authority scoring.
    pub category: Option<String>,
    pub department: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DocumentInfo {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// One chunk in the form the vector index stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub text: String,
    pub metadata: FlatMetadata,
}

/// Serialise a finalised chunk and its document attributes for the index.
pub fn flatten(chunk: &Chunk, document: &DocumentInfo) -> Result<IndexRecord> {
    let mut metadata = FlatMetadata::new();
    let mut put = |key: &str, value: MetadataValue| {
        metadata.insert(key.to_string(), value);
    };

    put(DOCUMENT_ID, chunk.document_id.as_str().into());
    put(CHUNK_INDEX, chunk.index.into());
    put(WORD_COUNT, chunk.word_count.into());
    put(QUALITY_SCORE, chunk.quality_score.into());
    put(KEYWORDS, chunk.keywords.join(",").into());
    put(HEADERS, serde_json::to_string(&chunk.headers)?.into());
    put(
        DOCUMENT_STRUCTURE,
        serde_json::to_string(&chunk.metadata.document_structure)?.into(),
    );
    put(SENTENCE_COUNT, chunk.metadata.sentence_count.into());
    put(HAS_OVERLAP, chunk.metadata.has_overlap.into());
    put(TOTAL_CHUNKS, chunk.metadata.total_chunks.into());

    if let Some(category) = &document.category {
        put(CATEGORY, category.as_str().into());
    }
    if let Some(department) = &document.department {
        put(DEPARTMENT, department.as_str().into());
    }
    if let Some(filename) = &document.filename {
        put(FILENAME, filename.as_str().into());
    }
    if let Some(created_at) = &document.created_at {
        put(CREATED_AT, created_at.to_rfc3339().into());
    }

    Ok(IndexRecord {
        id: chunk.id.clone(),
        text: chunk.text.clone(),
        metadata,
    })
}

/// A chunk as read back from the vector index.
///
/// Every metadata-derived field is optional or defaults to empty, since the
/// index may hold records written by older versions or other producers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub document_id: Option<String>,
    pub index: Option<usize>,
    pub quality_score: Option<f64>,
    pub keywords: Vec<String>,
    pub headers: Vec<Header>,
    pub document_structure: DocumentStructure,
    pub sentence_count: Option<usize>,
    pub has_overlap: bool,
    pub total_chunks: Option<usize>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub filename: Option<String>,
    /// Raw creation timestamp, parsed lazily by the prioritizer.
    pub created_at: Option<String>,
}

impl ChunkRecord {
    /// Decode an index hit. Malformed fields degrade to empty values.
    pub fn from_hit(id: impl Into<String>, text: impl Into<String>, metadata: &FlatMetadata) -> Self {
        let id = id.into();
        let headers = decode_json(metadata, HEADERS, &id);
        let document_structure = decode_json(metadata, DOCUMENT_STRUCTURE, &id);

        Self {
            text: text.into(),
            document_id: get_str(metadata, DOCUMENT_ID),
            index: get_int(metadata, CHUNK_INDEX).and_then(|v| usize::try_from(v).ok()),
            quality_score: get_float(metadata, QUALITY_SCORE, &id),
            keywords: get_str(metadata, KEYWORDS)
                .map(|joined| split_keywords(&joined))
                .unwrap_or_default(),
            headers,
            document_structure,
            sentence_count: get_int(metadata, SENTENCE_COUNT).and_then(|v| usize::try_from(v).ok()),
            has_overlap: get_bool(metadata, HAS_OVERLAP).unwrap_or(false),
            total_chunks: get_int(metadata, TOTAL_CHUNKS).and_then(|v| usize::try_from(v).ok()),
            category: get_str(metadata, CATEGORY),
            department: get_str(metadata, DEPARTMENT),
            filename: get_str(metadata, FILENAME),
            created_at: get_str(metadata, CREATED_AT),
            id,
        }
    }

    /// Build a record directly from a chunk, as if it had round-tripped the index.
    pub fn from_chunk(chunk: &Chunk, document: &DocumentInfo) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            document_id: Some(chunk.document_id.clone()),
            index: Some(chunk.index),
            quality_score: Some(chunk.quality_score),
            keywords: chunk.keywords.clone(),
            headers: chunk.headers.clone(),
            document_structure: chunk.metadata.document_structure.clone(),
            sentence_count: Some(chunk.metadata.sentence_count),
            has_overlap: chunk.metadata.has_overlap,
            total_chunks: Some(chunk.metadata.total_chunks),
            category: document.category.clone(),
            department: document.department.clone(),
            filename: document.filename.clone(),
            created_at: document.created_at.map(|t| t.to_rfc3339()),
        }
    }

    /// Identifier of the originating source: filename, else document id, else chunk id.
    pub fn source_id(&self) -> &str {
        self.filename
            .as_deref()
            .or(self.document_id.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

fn split_keywords(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_json<T: DeserializeOwned + Default>(metadata: &FlatMetadata, key: &str, id: &str) -> T {
    match metadata.get(key) {
        None => T::default(),
        Some(MetadataValue::Str(raw)) => match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                let err = RagError::decode(key, e.to_string());
                tracing::warn!(chunk_id = id, error = %err, "Resetting malformed metadata field");
                T::default()
            }
        },
        Some(other) => {
            let err = RagError::decode(key, format!("expected JSON string, found {other:?}"));
            tracing::warn!(chunk_id = id, error = %err, "Resetting malformed metadata field");
            T::default()
        }
    }
}

fn get_str(metadata: &FlatMetadata, key: &str) -> Option<String> {
    match metadata.get(key)? {
        MetadataValue::Str(s) => Some(s.clone()),
        MetadataValue::Int(i) => Some(i.to_string()),
        MetadataValue::Float(f) => Some(f.to_string()),
        MetadataValue::Bool(b) => Some(b.to_string()),
    }
}

fn get_int(metadata: &FlatMetadata, key: &str) -> Option<i64> {
    match metadata.get(key)? {
        MetadataValue::Int(i) => Some(*i),
        MetadataValue::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric field as a finite float; `NaN` and infinities are treated as absent.
fn get_float(metadata: &FlatMetadata, key: &str, id: &str) -> Option<f64> {
    let value = match metadata.get(key)? {
        MetadataValue::Float(f) => *f,
        MetadataValue::Int(i) => *i as f64,
        MetadataValue::Str(s) => s.trim().parse().ok()?,
        MetadataValue::Bool(_) => return None,
    };
    if value.is_finite() {
        return Some(value);
    }
    let err = RagError::decode(key, format!("non-finite value {value}"));
    tracing::warn!(chunk_id = id, error = %err, "Resetting malformed metadata field");
    None
}

fn get_bool(metadata: &FlatMetadata, key: &str) -> Option<bool> {
    match metadata.get(key)? {
        MetadataValue::Bool(b) => Some(*b),
        MetadataValue::Str(s) => s.trim().parse().ok(),
        MetadataValue::Int(i) => Some(*i != 0),
        MetadataValue::Float(_) => None,
    }
}

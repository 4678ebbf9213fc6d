//! Document ingestion into the vector index.
//!
//! chunk → deduplicate → quality filter → flatten → embed → index. Unlike the
//! query path, ingestion propagates embedding and index errors: a document
//! is either fully indexed or reported as failed.

use crate::chunk::{SemanticChunker, finalize_chunks};
use crate::config::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::filter::{deduplicate, filter_low_quality};
use crate::index::VectorIndex;
use crate::metadata::{DocumentInfo, flatten};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// File extensions picked up by directory ingestion.
const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: Option<String>,
    /// Chunks produced before filtering.
    pub chunks_created: usize,
    pub duplicates_removed: usize,
    pub low_quality_removed: usize,
    pub chunks_indexed: usize,
    /// Chunks of a previous version of the document that were replaced.
    pub chunks_replaced: usize,
}

/// Chunks documents and writes them to a vector index.
pub struct DocumentIngestor {
    chunker: SemanticChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl DocumentIngestor {
    pub fn new(
        config: ChunkingConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            chunker: SemanticChunker::new(config),
            embedder,
            index,
        }
    }

    /// Index `text` as `document`, replacing any chunks already stored for it.
    pub async fn ingest_text(&self, text: &str, document: &DocumentInfo) -> Result<IngestReport> {
        if document.document_id.trim().is_empty() {
            return Err(RagError::invalid_input("document id must not be empty"));
        }
        let config = self.chunker.config();
        let chunks = self.chunker.chunk(text, &document.document_id);
        let created = chunks.len();
        let unique = deduplicate(chunks, config.dedup_threshold);
        let after_dedup = unique.len();
        let mut kept = filter_low_quality(unique, config.quality_threshold);
        finalize_chunks(&mut kept);

        let mut report = IngestReport {
            document_id: document.document_id.clone(),
            filename: document.filename.clone(),
            chunks_created: created,
            duplicates_removed: created - after_dedup,
            low_quality_removed: after_dedup - kept.len(),
            ..Default::default()
        };

        if kept.is_empty() {
            report.chunks_replaced = self.remove_document(&document.document_id).await?;
            tracing::warn!(document_id = %document.document_id, "Document produced no indexable chunks");
            return Ok(report);
        }

        let records = kept
            .iter()
            .map(|chunk| flatten(chunk, document))
            .collect::<Result<Vec<_>>>()?;
        let texts: Vec<&str> = kept.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != records.len() {
            return Err(RagError::model_unavailable(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                records.len()
            )));
        }

        // Old chunks go only once the new version is ready to be written.
        report.chunks_replaced = self.remove_document(&document.document_id).await?;
        report.chunks_indexed = records.len();
        self.index.add(records, embeddings).await?;

        tracing::info!(
            document_id = %report.document_id,
            created = report.chunks_created,
            duplicates = report.duplicates_removed,
            low_quality = report.low_quality_removed,
            indexed = report.chunks_indexed,
            "Ingested document"
        );
        Ok(report)
    }

    /// Index one UTF-8 text file.
    ///
    /// The document id is the file path, the filename its last component and
    /// the creation time its modification time.
    pub async fn ingest_file(&self, path: &Path, category: Option<&str>) -> Result<IngestReport> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut document = DocumentInfo::new(path.to_string_lossy());
        if let Some(name) = path.file_name() {
            document.filename = Some(name.to_string_lossy().into_owned());
        }
        document.category = category.map(str::to_string);
        document.created_at = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        self.ingest_text(&content, &document).await
    }

    /// Index every supported file under `dir`, recursively.
    ///
    /// Files that cannot be read are skipped with a warning; embedding and
    /// index failures abort the run.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        category: Option<&str>,
    ) -> Result<Vec<IngestReport>> {
        if !dir.is_dir() {
            return Err(RagError::invalid_input(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let mut reports = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .flatten()
        {
            if !entry.file_type().is_file() || !is_supported(entry.path()) {
                continue;
            }
            match self.ingest_file(entry.path(), category).await {
                Ok(report) => reports.push(report),
                Err(RagError::Io(e)) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Delete every chunk of `document_id` from the index.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let ids = self.index.ids_for_document(document_id).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.index.delete(&ids).await?;
        tracing::debug!(document_id, removed, "Removed document chunks");
        Ok(removed)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

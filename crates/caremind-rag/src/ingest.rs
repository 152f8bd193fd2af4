//! Document ingestion pipeline: chunk → dedup → embed → upsert.
//!
//! Text extraction (PDF/DOCX parsing) happens upstream; this pipeline
//! receives already-extracted text with a filename and an owner scope.

use std::sync::Arc;

use caremind_core::Result;
use caremind_core::config::CaremindConfig;
use caremind_core::traits::{EmbeddingProvider, VectorStore};
use caremind_core::types::{OwnerScope, RecordPayload, VectorPoint, collections};

use crate::chunker::Chunker;
use crate::dedup::Deduplicator;

/// How many stored texts to pull for the duplicate check.
const DEDUP_SCAN_LIMIT: usize = 1000;

/// Outcome of one document ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// The whole file was already ingested and skipped.
    pub file_skipped: bool,
    pub chunks_total: usize,
    pub stored: usize,
    pub duplicates: usize,
}

/// Runs the ingestion pipeline for shared and per-user documents.
pub struct DocumentIngestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    dedup: Deduplicator,
    shared_kb: String,
}

impl DocumentIngestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &CaremindConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::default(),
            dedup: Deduplicator::new(config.retrieval.dedup_threshold),
            shared_kb: collections::shared_kb(&config.vector_store.shared_kb),
        }
    }

    /// The collection a document lands in, per the persisted state layout.
    pub fn collection_for(&self, owner: &OwnerScope) -> String {
        match owner {
            OwnerScope::Shared => self.shared_kb.clone(),
            OwnerScope::User(id) => collections::user_docs(id),
        }
    }

    /// Ingest one document's extracted text.
    ///
    /// A file already present for this owner is skipped entirely; individual
    /// chunks that near-duplicate stored content are dropped. Stored chunks
    /// are immutable afterwards.
    pub async fn ingest_text(
        &self,
        owner: &OwnerScope,
        filename: &str,
        text: &str,
    ) -> Result<IngestReport> {
        let collection = self.collection_for(owner);
        self.store
            .ensure_collection(&collection, self.embedder.dimension())
            .await?;

        let existing = self.store.scroll_texts(&collection, DEDUP_SCAN_LIMIT).await?;
        if existing.iter().any(|e| e.source == filename) {
            tracing::info!("⏭️ Skipping already-ingested file: {filename}");
            return Ok(IngestReport { file_skipped: true, ..IngestReport::default() });
        }

        let chunks = self.chunker.chunk(text);
        let mut report = IngestReport { chunks_total: chunks.len(), ..IngestReport::default() };

        let mut known_texts: Vec<String> = existing.into_iter().map(|e| e.text).collect();
        let mut accepted: Vec<String> = Vec::new();

        for chunk in chunks {
            if self.dedup.is_duplicate(&chunk, known_texts.iter().map(String::as_str)) {
                tracing::debug!("🔄 Duplicate chunk skipped ({filename})");
                report.duplicates += 1;
                continue;
            }
            known_texts.push(chunk.clone());
            accepted.push(chunk);
        }

        if accepted.is_empty() {
            tracing::info!(
                "ℹ️ Nothing new in {filename}: {} duplicate chunk(s)",
                report.duplicates
            );
            return Ok(report);
        }

        let vectors = self.embedder.embed_batch(&accepted).await?;
        for (chunk, vector) in accepted.into_iter().zip(vectors) {
            let point = VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                text: chunk,
                payload: RecordPayload::document(owner, filename),
            };
            self.store.upsert(&collection, point).await?;
            report.stored += 1;
        }

        tracing::info!(
            "✅ Ingested {filename} for {owner}: {} stored, {} duplicate(s)",
            report.stored,
            report.duplicates
        );
        Ok(report)
    }

    /// Explicitly remove a previously ingested document and all its chunks.
    /// This is the only path that ever deletes chunks.
    pub async fn remove_document(&self, owner: &OwnerScope, filename: &str) -> Result<()> {
        let collection = self.collection_for(owner);
        self.store.delete_by_source(&collection, filename).await
    }
}

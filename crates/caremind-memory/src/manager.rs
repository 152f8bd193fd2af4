//! Conversation Memory Manager — records turns, schedules extraction,
//! recalls relevant memory for retrieval.

use std::sync::Arc;

use caremind_core::Result;
use caremind_core::config::CaremindConfig;
use caremind_core::traits::vector::OwnerFilter;
use caremind_core::traits::{EmbeddingProvider, VectorStore};
use caremind_core::types::{
    KnowledgeSource, MemoryKind, MemoryRecord, RecordPayload, RetrievalResult, TurnRange,
    VectorPoint,
};
use chrono::Utc;
use uuid::Uuid;

use crate::db::MemoryDb;
use crate::extraction::InsightExtractor;
use crate::session::ConversationSession;

/// Upper bound on queue entries drained per boundary.
const DRAIN_BATCH: usize = 16;

/// Coordinates the turn log, the extraction queue and memory recall.
pub struct ConversationMemoryManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    db: Arc<MemoryDb>,
    extractor: InsightExtractor,
    extraction_interval: u64,
    session_window: usize,
}

impl ConversationMemoryManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        db: Arc<MemoryDb>,
        config: &CaremindConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            db,
            extractor: InsightExtractor::new(),
            extraction_interval: config.memory.extraction_interval,
            session_window: config.memory.session_window,
        }
    }

    pub fn start_session(&self, owner_id: impl Into<String>) -> ConversationSession {
        ConversationSession::new(owner_id, self.session_window)
    }

    /// Record one completed exchange: append to the session window, embed
    /// and store the turn, log it durably, and at every extraction boundary
    /// queue the latest block and drain the queue.
    ///
    /// Extraction failures never fail the turn; failed jobs wait for the
    /// next boundary.
    pub async fn record_turn(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<()> {
        let turn = session.push_turn(user_text, assistant_text);
        let text = format!("Caregiver: {user_text}\nAssistant: {assistant_text}");

        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: session.owner_id.clone(),
            kind: MemoryKind::ChatTurn,
            text: text.clone(),
            turn_range: TurnRange::new(turn, turn),
            created_at: Utc::now(),
        };

        self.store_record(&record).await?;
        self.db.log_record(&record)?;
        tracing::debug!("💬 Recorded turn {turn} for {}", session.owner_id);

        if turn % self.extraction_interval == 0 {
            let start = turn - self.extraction_interval + 1;
            let transcript = session.recent_transcript(self.extraction_interval as usize);
            if self
                .db
                .enqueue_extraction(&session.owner_id, &session.id, start, turn, &transcript)?
            {
                tracing::info!("🧮 Queued insight extraction for turns {start}-{turn}");
            }
            let drained = self.drain_queue().await?;
            if drained > 0 {
                tracing::info!("✅ Extracted insights from {drained} block(s)");
            }
        }

        Ok(())
    }

    /// Process pending extraction jobs. A failing job is marked for retry
    /// and skipped; it does not block the rest of the queue.
    pub async fn drain_queue(&self) -> Result<usize> {
        let jobs = self.db.pending_jobs(DRAIN_BATCH)?;
        let mut done = 0;

        for job in jobs {
            match self.run_extraction(&job).await {
                Ok(count) => {
                    self.db.mark_done(job.id)?;
                    done += 1;
                    tracing::debug!(
                        "🧮 Block {}-{} for {} produced {count} record(s)",
                        job.turn_start,
                        job.turn_end,
                        job.owner_id
                    );
                }
                Err(e) => {
                    self.db.mark_failed(job.id)?;
                    tracing::warn!(
                        "⚠️ Extraction deferred for turns {}-{} (attempt {}): {e}",
                        job.turn_start,
                        job.turn_end,
                        job.attempts + 1
                    );
                }
            }
        }
        Ok(done)
    }

    async fn run_extraction(&self, job: &crate::db::ExtractionJob) -> Result<usize> {
        let insights = self.extractor.extract(&job.transcript);
        for insight in &insights {
            let record = MemoryRecord {
                id: Uuid::new_v4().to_string(),
                owner_id: job.owner_id.clone(),
                kind: insight.kind,
                text: insight.text.clone(),
                turn_range: TurnRange::new(job.turn_start, job.turn_end),
                created_at: Utc::now(),
            };
            self.store_record(&record).await?;
            self.db.log_record(&record)?;
        }
        Ok(insights.len())
    }

    /// Embed and upsert one record into its kind's per-owner collection.
    async fn store_record(&self, record: &MemoryRecord) -> Result<()> {
        let collection = record.kind.collection(&record.owner_id);
        self.store
            .ensure_collection(&collection, self.embedder.dimension())
            .await?;
        let vector = self.embedder.embed(&record.text).await?;
        let point = VectorPoint {
            id: record.id.clone(),
            vector,
            text: record.text.clone(),
            payload: RecordPayload {
                owner: record.owner_id.clone(),
                source: collection.clone(),
                created_at: record.created_at,
                kind: Some(record.kind.as_str().to_string()),
                turn_range: Some(record.turn_range),
            },
        };
        self.store.upsert(&collection, point).await
    }

    /// Search all memory collections for one owner and merge by score.
    /// The query vector is computed once by the caller.
    pub async fn recall(
        &self,
        owner_id: &str,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let filter = OwnerFilter::new(owner_id);
        let retrieved_at = Utc::now();
        let mut results = Vec::new();

        for kind in [
            MemoryKind::ChatTurn,
            MemoryKind::Insight,
            MemoryKind::Preference,
            MemoryKind::Strategy,
        ] {
            let collection = kind.collection(owner_id);
            let hits = self.store.search(&collection, query_vector, k, &filter).await?;
            for hit in hits {
                results.push(RetrievalResult {
                    id: hit.id,
                    text: hit.text,
                    score: hit.score,
                    source_label: collection.clone(),
                    kind: KnowledgeSource::Memory,
                    created_at: hit.payload.created_at,
                    retrieved_at,
                });
            }
        }

        results.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }
}

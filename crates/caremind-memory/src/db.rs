//! Durable memory database (SQLite).
//!
//! Two tables: an append-only log of every memory record, and a deferred
//! extraction queue. Queue rows are unique per (owner, session, turn range),
//! so re-enqueueing the same block is a no-op and extraction stays
//! idempotent across retries.

use std::path::Path;
use std::sync::Mutex;

use caremind_core::error::{CaremindError, Result};
use caremind_core::types::MemoryRecord;
use chrono::Utc;
use rusqlite::{Connection, params};

/// One pending extraction unit of work.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub id: i64,
    pub owner_id: String,
    pub session_id: String,
    pub turn_start: u64,
    pub turn_end: u64,
    pub transcript: String,
    pub attempts: u32,
}

/// SQLite-backed durable store for memory records and the extraction queue.
pub struct MemoryDb {
    conn: Mutex<Connection>,
}

impl MemoryDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| CaremindError::Memory(format!("Failed to open memory db: {e}")))?;
        Self::init(conn)
    }

    /// Ephemeral database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CaremindError::Memory(format!("Failed to open memory db: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_log (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL,
                turn_start INTEGER NOT NULL,
                turn_end INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_log_owner
                ON memory_log(owner_id, kind);

            CREATE TABLE IF NOT EXISTS extraction_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                turn_start INTEGER NOT NULL,
                turn_end INTEGER NOT NULL,
                transcript TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(owner_id, session_id, turn_start, turn_end)
            );",
        )
        .map_err(|e| CaremindError::Memory(format!("Failed to init memory db: {e}")))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CaremindError::Memory("memory db lock poisoned".into()))
    }

    /// Append one record to the durable log.
    pub fn log_record(&self, record: &MemoryRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO memory_log
                (id, owner_id, kind, text, turn_start, turn_end, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.owner_id,
                record.kind.as_str(),
                record.text,
                record.turn_range.start as i64,
                record.turn_range.end as i64,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| CaremindError::Memory(format!("Failed to log memory record: {e}")))?;
        Ok(())
    }

    /// Queue a turn block for extraction. Returns false if this exact block
    /// was already queued or processed.
    pub fn enqueue_extraction(
        &self,
        owner_id: &str,
        session_id: &str,
        turn_start: u64,
        turn_end: u64,
        transcript: &str,
    ) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO extraction_queue
                    (owner_id, session_id, turn_start, turn_end, transcript, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    owner_id,
                    session_id,
                    turn_start as i64,
                    turn_end as i64,
                    transcript,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| CaremindError::Memory(format!("Failed to enqueue extraction: {e}")))?;
        Ok(inserted > 0)
    }

    /// All pending jobs, oldest first. Previously failed jobs stay pending
    /// and show up again here.
    pub fn pending_jobs(&self, limit: usize) -> Result<Vec<ExtractionJob>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, session_id, turn_start, turn_end, transcript, attempts
                 FROM extraction_queue WHERE status = 'pending'
                 ORDER BY id ASC LIMIT ?1",
            )
            .map_err(|e| CaremindError::Memory(format!("Failed to query queue: {e}")))?;

        let jobs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ExtractionJob {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    session_id: row.get(2)?,
                    turn_start: row.get::<_, i64>(3)? as u64,
                    turn_end: row.get::<_, i64>(4)? as u64,
                    transcript: row.get(5)?,
                    attempts: row.get::<_, i64>(6)? as u32,
                })
            })
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| CaremindError::Memory(format!("Failed to read queue: {e}")))?;
        Ok(jobs)
    }

    pub fn mark_done(&self, job_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE extraction_queue SET status = 'done' WHERE id = ?1",
            params![job_id],
        )
        .map_err(|e| CaremindError::Memory(format!("Failed to update queue: {e}")))?;
        Ok(())
    }

    /// Record a failed attempt. The job stays pending and is retried at the
    /// next extraction boundary.
    pub fn mark_failed(&self, job_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE extraction_queue SET attempts = attempts + 1 WHERE id = ?1",
            params![job_id],
        )
        .map_err(|e| CaremindError::Memory(format!("Failed to update queue: {e}")))?;
        Ok(())
    }

    /// Count of logged records for one owner, optionally filtered by kind.
    pub fn record_count(&self, owner_id: &str, kind: Option<&str>) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = match kind {
            Some(kind) => conn
                .query_row(
                    "SELECT COUNT(*) FROM memory_log WHERE owner_id = ?1 AND kind = ?2",
                    params![owner_id, kind],
                    |row| row.get(0),
                )
                .map_err(|e| CaremindError::Memory(format!("Failed to count records: {e}")))?,
            None => conn
                .query_row(
                    "SELECT COUNT(*) FROM memory_log WHERE owner_id = ?1",
                    params![owner_id],
                    |row| row.get(0),
                )
                .map_err(|e| CaremindError::Memory(format!("Failed to count records: {e}")))?,
        };
        Ok(count as u64)
    }
}

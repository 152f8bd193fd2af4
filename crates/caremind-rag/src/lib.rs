//! # Caremind RAG
//!
//! The ingestion and retrieval primitives of Caremind:
//! - **Chunker** — splits raw document text into embeddable units
//! - **Deduplicator** — cheap lexical near-duplicate detection at ingestion
//! - **Diversity selector** — top-k selection under a minimum-distinct-sources
//!   constraint
//! - **Vector store adapters** — Qdrant over REST, plus an in-memory store
//!   for tests and single-process deployments
//! - **Ingestion pipeline** — chunk → dedup → embed → upsert

pub mod chunker;
pub mod dedup;
pub mod diversity;
pub mod ingest;
pub mod memory_store;
pub mod qdrant;

pub use chunker::Chunker;
pub use dedup::Deduplicator;
pub use diversity::select_diverse;
pub use ingest::{DocumentIngestor, IngestReport};
pub use memory_store::InMemoryVectorStore;
pub use qdrant::QdrantStore;

use caremind_core::Result;
use caremind_core::config::CaremindConfig;
use caremind_core::error::CaremindError;
use caremind_core::traits::VectorStore;

/// Create the vector store backend from configuration.
pub fn create_vector_store(config: &CaremindConfig) -> Result<Box<dyn VectorStore>> {
    match config.vector_store.backend.as_str() {
        "qdrant" => Ok(Box::new(QdrantStore::new(&config.vector_store)?)),
        "memory" => Ok(Box::new(InMemoryVectorStore::new())),
        other => Err(CaremindError::Config(format!(
            "Unknown vector store backend '{other}' (expected 'qdrant' or 'memory')"
        ))),
    }
}

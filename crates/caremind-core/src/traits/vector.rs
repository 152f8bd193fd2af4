//! Vector store seam: named collections of (id, vector, text, payload)
//! records with filtered nearest-neighbor search.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ScoredPoint, StoredText, VectorPoint};

/// Exact-match owner filter applied to every search, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    pub owner: String,
}

impl OwnerFilter {
    pub fn new(owner: impl Into<String>) -> Self {
        Self { owner: owner.into() }
    }

    pub fn matches(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

/// A set of named vector collections with similarity search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()>;

    /// Nearest-neighbor search restricted to records matching `filter`.
    /// The filter is applied before scoring, never after.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: &OwnerFilter,
    ) -> Result<Vec<ScoredPoint>>;

    /// Enumerate stored texts and their source labels, for duplicate checks
    /// at ingestion time.
    async fn scroll_texts(&self, collection: &str, limit: usize) -> Result<Vec<StoredText>>;

    /// Delete every record of the given source label from the collection.
    /// Explicit document removal is the only way chunks are ever deleted.
    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_filter_exact_match() {
        let filter = OwnerFilter::new("alice");
        assert!(filter.matches("alice"));
        assert!(!filter.matches("bob"));
        assert!(!filter.matches("alice2"));
    }
}

//! In-memory vector store — cosine similarity over RAM-resident collections.
//!
//! Used by tests and single-process deployments. Owner filtering follows the
//! same contract as the Qdrant adapter: records are filtered before scoring,
//! never after.

use std::collections::HashMap;

use async_trait::async_trait;
use caremind_core::error::{CaremindError, Result};
use caremind_core::traits::vector::{OwnerFilter, VectorStore};
use caremind_core::types::{ScoredPoint, StoredText, VectorPoint};
use tokio::sync::RwLock;

/// Cosine similarity clamped to [0, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.0)
}

struct Collection {
    dimension: usize,
    points: Vec<VectorPoint>,
}

/// RAM-resident vector store with the same search contract as Qdrant.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self { collections: RwLock::new(HashMap::new()) }
    }

    /// Total record count across all collections.
    pub async fn len(&self) -> usize {
        self.collections
            .read()
            .await
            .values()
            .map(|c| c.points.len())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Record count in one collection (zero if it does not exist).
    pub async fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection { dimension, points: Vec::new() });
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        let mut collections = self.collections.write().await;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| CaremindError::Store(format!("Unknown collection: {collection}")))?;
        if point.vector.len() != coll.dimension {
            return Err(CaremindError::Store(format!(
                "Dimension mismatch in {collection}: expected {}, got {}",
                coll.dimension,
                point.vector.len()
            )));
        }
        if let Some(existing) = coll.points.iter_mut().find(|p| p.id == point.id) {
            *existing = point;
        } else {
            coll.points.push(point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: &OwnerFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            // A collection that was never written is empty, not an error.
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredPoint> = coll
            .points
            .iter()
            .filter(|p| filter.matches(&p.payload.owner))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                text: p.text.clone(),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn scroll_texts(&self, collection: &str, limit: usize) -> Result<Vec<StoredText>> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(coll
            .points
            .iter()
            .take(limit)
            .map(|p| StoredText { text: p.text.clone(), source: p.payload.source.clone() })
            .collect())
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(coll) = collections.get_mut(collection) {
            let before = coll.points.len();
            coll.points.retain(|p| p.payload.source != source);
            tracing::debug!(
                "🗑️ Removed {} records of source '{source}' from {collection}",
                before - coll.points.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::types::{OwnerScope, RecordPayload};

    fn point(id: &str, vector: Vec<f32>, owner: &str, source: &str) -> VectorPoint {
        let scope = if owner == "shared" {
            OwnerScope::Shared
        } else {
            OwnerScope::user(owner)
        };
        VectorPoint {
            id: id.into(),
            vector,
            text: format!("text for {id}"),
            payload: RecordPayload::document(&scope, source),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        // Opposite vectors clamp to zero rather than going negative
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_upsert_and_search() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("kb_test", 2).await.unwrap();
        store.upsert("kb_test", point("1", vec![1.0, 0.0], "shared", "doc_a")).await.unwrap();
        store.upsert("kb_test", point("2", vec![0.0, 1.0], "shared", "doc_b")).await.unwrap();

        let filter = OwnerFilter::new("shared");
        let hits = store.search("kb_test", &[1.0, 0.1], 10, &filter).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_owner_isolation_is_absolute() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store.upsert("docs", point("a1", vec![1.0, 0.0], "alice", "alice.txt")).await.unwrap();
        store.upsert("docs", point("b1", vec![1.0, 0.0], "bob", "bob.txt")).await.unwrap();

        let hits = store
            .search("docs", &[1.0, 0.0], 10, &OwnerFilter::new("alice"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.owner, "alice");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store.upsert("docs", point("1", vec![1.0, 0.0], "shared", "a")).await.unwrap();
        store.upsert("docs", point("1", vec![0.0, 1.0], "shared", "a")).await.unwrap();
        assert_eq!(store.collection_len("docs").await, 1);
    }

    #[tokio::test]
    async fn test_dimension_enforced() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 3).await.unwrap();
        let result = store.upsert("docs", point("1", vec![1.0, 0.0], "shared", "a")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_by_source() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("docs", 2).await.unwrap();
        store.upsert("docs", point("1", vec![1.0, 0.0], "alice", "old.txt")).await.unwrap();
        store.upsert("docs", point("2", vec![0.0, 1.0], "alice", "keep.txt")).await.unwrap();
        store.delete_by_source("docs", "old.txt").await.unwrap();

        let texts = store.scroll_texts("docs", 100).await.unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].source, "keep.txt");
    }

    #[tokio::test]
    async fn test_missing_collection_searches_empty() {
        let store = InMemoryVectorStore::new();
        let hits = store
            .search("nope", &[1.0], 5, &OwnerFilter::new("shared"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}

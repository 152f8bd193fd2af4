//! Qdrant vector store adapter over the REST API.
//!
//! Cosine-distance collections of `(id, vector, text, payload)` records.
//! Every search carries a `must` filter on the owner payload field, so
//! isolation is enforced inside the store, before scoring.

use async_trait::async_trait;
use caremind_core::config::VectorStoreConfig;
use caremind_core::error::{CaremindError, Result};
use caremind_core::traits::vector::{OwnerFilter, VectorStore};
use caremind_core::types::{RecordPayload, ScoredPoint, StoredText, VectorPoint};
use serde_json::{Value, json};

/// Vector store backed by a Qdrant server.
pub struct QdrantStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(CaremindError::Config("vector_store.url must not be empty".into()));
        }
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.client.request(method, url);
        if !self.api_key.is_empty() {
            req = req.header("api-key", &self.api_key);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = req
            .send()
            .await
            .map_err(|e| CaremindError::Store(format!("Qdrant {what} failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CaremindError::Store(format!(
                "Qdrant {what} error {status}: {text}"
            )));
        }
        resp.json()
            .await
            .map_err(|e| CaremindError::Store(format!("Qdrant {what} malformed response: {e}")))
    }

    fn parse_payload(value: &Value) -> Result<(String, RecordPayload)> {
        let text = value["text"].as_str().unwrap_or_default().to_string();
        let payload: RecordPayload = serde_json::from_value(value.clone())
            .map_err(|e| CaremindError::Store(format!("Bad record payload: {e}")))?;
        Ok((text, payload))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let exists = self
            .request(reqwest::Method::GET, &format!("/collections/{collection}"))
            .send()
            .await
            .map_err(|e| CaremindError::Store(format!("Qdrant connection failed: {e}")))?
            .status()
            .is_success();

        if exists {
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        self.send(
            self.request(reqwest::Method::PUT, &format!("/collections/{collection}"))
                .json(&body),
            "create collection",
        )
        .await?;
        tracing::info!("📚 Created collection: {collection}");
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        let mut payload = serde_json::to_value(&point.payload)
            .map_err(|e| CaremindError::Store(format!("Payload serialization failed: {e}")))?;
        payload["text"] = json!(point.text);

        let body = json!({
            "points": [{
                "id": point.id,
                "vector": point.vector,
                "payload": payload,
            }]
        });
        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
            )
            .json(&body),
            "upsert",
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: &OwnerFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
            "filter": {
                "must": [
                    { "key": "owner", "match": { "value": filter.owner } }
                ]
            }
        });

        let json = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/search"),
                )
                .json(&body),
                "search",
            )
            .await?;

        let mut hits = Vec::new();
        if let Some(results) = json["result"].as_array() {
            for hit in results {
                let (text, payload) = Self::parse_payload(&hit["payload"])?;
                hits.push(ScoredPoint {
                    id: hit["id"].as_str().unwrap_or_default().to_string(),
                    score: hit["score"].as_f64().unwrap_or(0.0).clamp(0.0, 1.0) as f32,
                    text,
                    payload,
                });
            }
        }
        Ok(hits)
    }

    async fn scroll_texts(&self, collection: &str, limit: usize) -> Result<Vec<StoredText>> {
        let body = json!({ "limit": limit, "with_payload": true });
        let json = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/scroll"),
                )
                .json(&body),
                "scroll",
            )
            .await?;

        let mut texts = Vec::new();
        if let Some(points) = json["result"]["points"].as_array() {
            for point in points {
                texts.push(StoredText {
                    text: point["payload"]["text"].as_str().unwrap_or_default().to_string(),
                    source: point["payload"]["source"].as_str().unwrap_or_default().to_string(),
                });
            }
        }
        Ok(texts)
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<()> {
        let body = json!({
            "filter": {
                "must": [
                    { "key": "source", "match": { "value": source } }
                ]
            }
        });
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/delete?wait=true"),
            )
            .json(&body),
            "delete",
        )
        .await?;
        tracing::info!("🗑️ Deleted records of source '{source}' from {collection}");
        Ok(())
    }
}

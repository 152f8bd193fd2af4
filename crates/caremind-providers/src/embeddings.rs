//! Embedding gateway over the OpenAI-compatible `/embeddings` endpoint.
//!
//! A failed call always returns an error. Returning a zero or default vector
//! would silently corrupt similarity rankings, so there is no fallback here.

use async_trait::async_trait;
use caremind_core::config::EmbeddingConfig;
use caremind_core::error::{CaremindError, Result};
use caremind_core::traits::EmbeddingProvider;
use serde_json::{Value, json};

/// Embedding provider speaking the OpenAI embeddings wire format.
pub struct OpenAiEmbeddings {
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = if !config.endpoint.is_empty() {
            config.endpoint.trim_end_matches('/').to_string()
        } else {
            "https://api.openai.com/v1".to_string()
        };

        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        };

        Ok(Self {
            name: config.provider.clone(),
            api_key,
            base_url,
            model: config.model.clone(),
            dimension: config.dimension,
            client: reqwest::Client::new(),
        })
    }

    fn parse_vectors(&self, json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let data = json["data"]
            .as_array()
            .ok_or_else(|| CaremindError::Embedding("No data in embeddings response".into()))?;

        if data.len() != expected {
            return Err(CaremindError::Embedding(format!(
                "Expected {expected} embeddings, got {}",
                data.len()
            )));
        }

        let mut vectors = Vec::with_capacity(data.len());
        for entry in data {
            let vector: Vec<f32> = entry["embedding"]
                .as_array()
                .ok_or_else(|| CaremindError::Embedding("Missing embedding field".into()))?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();

            if vector.len() != self.dimension {
                return Err(CaremindError::Embedding(format!(
                    "Dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
            vectors.push(vector);
        }
        Ok(vectors)
    }

    async fn request(&self, input: Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({ "model": self.model, "input": input });

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CaremindError::Embedding(format!("Connection failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CaremindError::Embedding(format!(
                "Embeddings API error {status}: {text}"
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| CaremindError::Embedding(format!("Malformed response: {e}")))?;

        self.parse_vectors(&json, expected)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(CaremindError::Embedding("Refusing to embed empty text".into()));
        }
        let mut vectors = self.request(json!(text), 1).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(CaremindError::Embedding("Refusing to embed empty text".into()));
        }
        tracing::debug!("🧮 Embedding batch of {} texts", texts.len());
        self.request(json!(texts), texts.len()).await
    }
}

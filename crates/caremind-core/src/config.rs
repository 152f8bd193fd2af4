//! Caremind configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CaremindError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaremindConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub flows: FlowsConfig,
}

impl CaremindConfig {
    /// Load config from the default path (~/.caremind/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaremindError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CaremindError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CaremindError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Caremind home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".caremind")
    }

    /// Validate the configuration at startup. Failures here are fatal and
    /// surfaced to the operator before any request is served.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.is_empty() {
            return Err(CaremindError::Config("llm.model must not be empty".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(CaremindError::Config(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        if self.vector_store.backend == "qdrant" && self.vector_store.url.is_empty() {
            return Err(CaremindError::Config(
                "vector_store.url is required for the qdrant backend".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.dedup_threshold)
            || self.retrieval.dedup_threshold == 0.0
        {
            return Err(CaremindError::Config(
                "retrieval.dedup_threshold must be in (0, 1]".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(CaremindError::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.decay_days <= 0.0 {
            return Err(CaremindError::Config(
                "retrieval.decay_days must be positive".into(),
            ));
        }
        if self.memory.extraction_interval == 0 {
            return Err(CaremindError::Config(
                "memory.extraction_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Language model (synthesis) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String { "openai".into() }
fn default_llm_model() -> String { "gpt-4o-mini".into() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 800 }
fn default_llm_timeout() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: String::new(),
            endpoint: String::new(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Embedding gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embed_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_embed_model")]
    pub model: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embed_provider() -> String { "openai".into() }
fn default_embed_model() -> String { "text-embedding-3-small".into() }
fn default_dimension() -> usize { 1536 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embed_provider(),
            api_key: String::new(),
            endpoint: String::new(),
            model: default_embed_model(),
            dimension: default_dimension(),
        }
    }
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// "qdrant" or "memory".
    #[serde(default = "default_vs_backend")]
    pub backend: String,
    #[serde(default = "default_vs_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Name of the single shared knowledge base collection (without prefix).
    #[serde(default = "default_shared_kb")]
    pub shared_kb: String,
}

fn default_vs_backend() -> String { "qdrant".into() }
fn default_vs_url() -> String { "http://localhost:6333".into() }
fn default_shared_kb() -> String { "care_support".into() }

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_vs_backend(),
            url: default_vs_url(),
            api_key: String::new(),
            shared_kb: default_shared_kb(),
        }
    }
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the durable memory database. Empty means ~/.caremind/memory.db.
    #[serde(default)]
    pub db_path: String,
    /// Insight extraction fires every N recorded turns.
    #[serde(default = "default_extraction_interval")]
    pub extraction_interval: u64,
    /// Active in-memory turn window per session.
    #[serde(default = "default_session_window")]
    pub session_window: usize,
}

fn default_extraction_interval() -> u64 { 10 }
fn default_session_window() -> usize { 25 }

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            extraction_interval: default_extraction_interval(),
            session_window: default_session_window(),
        }
    }
}

/// Retrieval tuning. These are deliberate knobs, not hardcoded constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Jaccard similarity at or above which a chunk is a duplicate.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Minimum distinct sources the diversity selector must represent.
    #[serde(default = "default_min_sources")]
    pub min_distinct_sources: usize,
    /// Result set bound per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Exponential decay horizon for temporal weighting, in days.
    #[serde(default = "default_decay_days")]
    pub decay_days: f64,
    /// Whether free-form routing may include the web source.
    #[serde(default)]
    pub enable_web: bool,
}

fn default_dedup_threshold() -> f64 { 0.8 }
fn default_min_sources() -> usize { 2 }
fn default_top_k() -> usize { 6 }
fn default_decay_days() -> f64 { 365.0 }

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            min_distinct_sources: default_min_sources(),
            top_k: default_top_k(),
            decay_days: default_decay_days(),
            enable_web: false,
        }
    }
}

/// Structured flow store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowsConfig {
    /// Path to the flow definition file. Empty means ~/.caremind/flows.json.
    #[serde(default)]
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CaremindConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.retrieval.min_distinct_sources, 2);
        assert_eq!(config.memory.extraction_interval, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [llm]
            provider = "ollama"
            model = "llama3.2"
            temperature = 0.5

            [retrieval]
            dedup_threshold = 0.9
            top_k = 4
        "#;

        let config: CaremindConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "llama3.2");
        assert!((config.retrieval.dedup_threshold - 0.9).abs() < 1e-9);
        assert_eq!(config.retrieval.top_k, 4);
        // Missing sections fall back to defaults
        assert_eq!(config.vector_store.backend, "qdrant");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CaremindConfig::default();
        config.retrieval.dedup_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = CaremindConfig::default();
        config.llm.model = String::new();
        assert!(config.validate().is_err());

        let mut config = CaremindConfig::default();
        config.vector_store.url = String::new();
        assert!(config.validate().is_err());

        let mut config = CaremindConfig::default();
        config.retrieval.decay_days = -1.0;
        assert!(config.validate().is_err());
    }
}

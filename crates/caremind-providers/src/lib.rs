//! # Caremind Providers
//!
//! External model access for Caremind: the chat-completion provider used by
//! the synthesis engine, and the embedding gateway used by ingestion and
//! recall. Both speak the OpenAI-compatible wire format, so any endpoint
//! exposing it (OpenAI, Groq, DeepSeek, OpenRouter, Ollama, llama.cpp)
//! works with a config change only.

pub mod embeddings;
pub mod openai_compatible;

use caremind_core::Result;
use caremind_core::config::CaremindConfig;
use caremind_core::traits::{EmbeddingProvider, Provider};

/// Create the chat provider from configuration.
pub fn create_provider(config: &CaremindConfig) -> Result<Box<dyn Provider>> {
    Ok(Box::new(openai_compatible::OpenAiCompatibleProvider::new(
        &config.llm,
    )?))
}

/// Create the embedding gateway from configuration.
pub fn create_embedder(config: &CaremindConfig) -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(embeddings::OpenAiEmbeddings::new(&config.embedding)?))
}

//! Trait seams implemented by the provider and storage crates.

pub mod embedding;
pub mod provider;
pub mod vector;

pub use embedding::EmbeddingProvider;
pub use provider::Provider;
pub use vector::VectorStore;

//! # Caremind Core
//!
//! Shared foundation for the Caremind workspace: configuration, the error
//! taxonomy, domain types, and the trait seams (`Provider`,
//! `EmbeddingProvider`, `VectorStore`) that the other crates implement.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{CaremindError, Result};

//! Embedding gateway seam: opaque text → fixed-dimension vector.

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a fixed-dimension vector. Pure function, no state.
///
/// A failure must return an error, never a zero/default vector — silent
/// zero-vectors would corrupt similarity rankings downstream.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The fixed output dimension every vector must have.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default implementation embeds serially;
    /// implementations with a batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

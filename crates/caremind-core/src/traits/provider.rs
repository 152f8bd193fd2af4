//! Language model provider seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatResponse, GenerateParams, Message};

/// A chat-completion language model.
///
/// Implementations must surface failures as errors; returning a fabricated
/// answer in place of a failed call is never acceptable.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[Message], params: &GenerateParams) -> Result<ChatResponse>;
}

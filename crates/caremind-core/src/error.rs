//! Error taxonomy for Caremind.
//!
//! Each variant maps to a distinct recovery policy:
//! - `Config` is fatal and surfaced to the operator at startup.
//! - `SourceUnavailable` is recovered locally: the failed source is excluded
//!   from the query and confidence is adjusted downward.
//! - `Embedding` abandons the calling retrieval step; it is never retried
//!   silently mid-request.
//! - `Synthesis` is surfaced to the caller as retryable; no fabricated answer
//!   is ever returned in its place.
//! - `Extraction` is recovered: the job stays queued and is retried at the
//!   next interval boundary, invisible to the end user.

use thiserror::Error;

/// All errors produced by the Caremind crates.
#[derive(Error, Debug)]
pub enum CaremindError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Embedding failure: {0}")]
    Embedding(String),

    #[error("Synthesis model failure: {0}")]
    Synthesis(String),

    #[error("Insight extraction failure: {0}")]
    Extraction(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Flow store error: {0}")]
    Flow(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaremindError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Synthesis(_) | Self::Http(_))
    }
}

/// Result type used throughout Caremind.
pub type Result<T> = std::result::Result<T, CaremindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CaremindError::Synthesis("timeout".into()).is_retryable());
        assert!(!CaremindError::Config("missing key".into()).is_retryable());
        assert!(!CaremindError::Extraction("deferred".into()).is_retryable());
    }
}

//! # Caremind Engine
//!
//! The query-time half of Caremind: route each query to knowledge sources,
//! retrieve in parallel, weight and diversify candidates, assemble context
//! in priority order and synthesize an attributed answer.

pub mod context;
pub mod router;
pub mod synthesis;

pub use router::Router;
pub use synthesis::{SynthesisEngine, WebSearch};

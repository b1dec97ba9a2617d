//! Embedding and text-generation gateway.
//!
//! Providers implement [`LlmProvider`]; [`EmbeddingGateway`] wraps one and is the
//! single place that enforces the configured embedding dimensionality for both
//! document and query embeddings.

pub mod any;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod provider;
pub(crate) mod retry;
pub(crate) mod sse;

pub use any::AnyProvider;
pub use error::LlmError;
pub use gateway::EmbeddingGateway;
pub use provider::{ChatStream, EmbedMode, LlmProvider};

//! Wiring for docent: configuration, process bootstrap, the grounded answer
//! service and stale-document reconciliation.

pub mod bootstrap;
pub mod config;
pub mod rag;
pub mod reconcile;

pub use bootstrap::AppContext;
pub use config::Config;
pub use rag::{Answer, RagError, RagService, StreamingAnswer};

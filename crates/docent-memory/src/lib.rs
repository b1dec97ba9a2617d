//! Document ingestion and nearest-neighbour retrieval over a SQLite vector store.
//!
//! Upload → extract → chunk → embed → commit, with all-or-nothing chunk
//! persistence per document; questions are embedded in query mode and matched by
//! cosine distance against the chunks of `ready` documents.

pub mod catalog;
pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod retrieval;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod vector;

pub use catalog::DocumentCatalog;
pub use document::{
    DocumentError, IngestReport, IngestionPipeline, MediaType, SplitterConfig, TextSplitter,
    Upload,
};
pub use error::MemoryError;
pub use in_memory_store::InMemoryStore;
pub use retrieval::Retriever;
pub use sqlite::SqliteStore;
pub use store::DocumentStore;
pub use types::{
    ChunkId, ChunkRecord, DocumentId, DocumentRecord, DocumentStatus, NewChunk, SearchHit,
};

//! corpus-rag: retrieval-augmented query service
//!
//! Ingests heterogeneous source documents, splits them into overlapping
//! sentence-window chunks, and answers prompts by retrieving the most
//! relevant chunks and passing them as grounding context to an external
//! generation backend. Answers carry denormalized references back to the
//! exact chunks that grounded them, and conversations can be continued
//! with their full history as context.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod query;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use types::{
    EngineSpec, EngineType, QueryDocument, QueryDocumentChunk, QueryEngine, QueryReference,
    QueryResult, UserQuery,
};

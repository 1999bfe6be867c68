//! Core types for the query engine service

pub mod document;
pub mod engine;
pub mod query;

pub use document::{DocFormat, QueryDocument, QueryDocumentChunk, SourceDocument};
pub use engine::{EngineSpec, EngineType, QueryEngine};
pub use query::{
    HistoryEntry, QueryReference, QueryResult, ReferenceSummary, UserQuery,
};

//! Provider abstractions for object storage, retrieval, and generation
//!
//! Trait-based seams so the external backends can be swapped (or mocked in
//! tests) without touching the pipeline or orchestrator.

pub mod generator;
pub mod object_store;
pub mod retriever;

#[cfg(feature = "gcp")]
pub mod gcs;

pub use generator::{Generator, OllamaGenerator};
pub use object_store::{FsObjectStore, ObjectHandle, ObjectStore};
pub use retriever::{HttpRetriever, RetrievedChunk, Retriever};

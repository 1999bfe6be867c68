//! Retrieval backend provider
//!
//! The vector index lives in an external service keyed by the engine's
//! embedding model and index identifier; this crate only ships chunks to it
//! at build time and asks for ranked chunk positions at query time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::types::{QueryDocumentChunk, QueryEngine};

/// One ranked hit from the retrieval backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Engine-wide chunk index
    pub chunk_index: u32,
    /// Similarity score, higher is better
    pub score: f32,
}

/// Vector indexing and nearest-neighbor retrieval
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Index an engine's chunk set; returns the backend index identifier
    async fn index_chunks(
        &self,
        engine: &QueryEngine,
        chunks: &[QueryDocumentChunk],
    ) -> Result<String>;

    /// Retrieve the top-ranked chunk positions for a query
    async fn retrieve(
        &self,
        engine: &QueryEngine,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Drop an engine's index
    async fn drop_index(&self, engine: &QueryEngine) -> Result<()>;

    /// Check whether the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct IndexRequest<'a> {
    engine_id: String,
    embedding_model: &'a str,
    vector_store: Option<&'a str>,
    chunks: Vec<IndexChunk<'a>>,
}

#[derive(Serialize)]
struct IndexChunk<'a> {
    index: u32,
    text: &'a str,
}

#[derive(Deserialize)]
struct IndexResponse {
    index_id: String,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
    embedding_model: &'a str,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    results: Vec<RetrievedChunk>,
}

/// HTTP client for the retrieval service
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    /// Create a client for the configured retrieval service
    pub fn new(config: &RetrievalConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn index_id_of<'a>(&self, engine: &'a QueryEngine) -> Result<&'a str> {
        engine
            .index_id
            .as_deref()
            .ok_or_else(|| Error::Internal(format!("engine {} has no index", engine.name)))
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn index_chunks(
        &self,
        engine: &QueryEngine,
        chunks: &[QueryDocumentChunk],
    ) -> Result<String> {
        let request = IndexRequest {
            engine_id: engine.id.to_string(),
            embedding_model: &engine.embedding_model,
            vector_store: engine.vector_store.as_deref(),
            chunks: chunks
                .iter()
                .map(|c| IndexChunk {
                    index: c.index,
                    text: &c.text,
                })
                .collect(),
        };

        let response: IndexResponse = self
            .client
            .post(format!("{}/indexes", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.index_id)
    }

    async fn retrieve(
        &self,
        engine: &QueryEngine,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let index_id = self.index_id_of(engine)?;

        let request = RetrieveRequest {
            query,
            top_k,
            embedding_model: &engine.embedding_model,
        };

        let response: RetrieveResponse = self
            .client
            .post(format!("{}/indexes/{}/query", self.base_url, index_id))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.results)
    }

    async fn drop_index(&self, engine: &QueryEngine) -> Result<()> {
        let index_id = self.index_id_of(engine)?;

        self.client
            .delete(format!("{}/indexes/{}", self.base_url, index_id))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

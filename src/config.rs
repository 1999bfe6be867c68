//! Configuration for the query engine service
//!
//! Loaded once at startup and passed into the pipeline and orchestrator;
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Query-time configuration
    #[serde(default)]
    pub query: QueryConfig,
    /// Retrieval backend configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Generation backend configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Source fetching configuration
    #[serde(default)]
    pub sources: SourceConfig,
    /// Storage paths
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any missing section.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config file: {}", e)))
    }

    /// Load from the path in `CORPUS_RAG_CONFIG`, or defaults if unset.
    pub fn load() -> Result<Self> {
        match std::env::var("CORPUS_RAG_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Sentence-window chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of sentences included before and after the center sentence
    /// when building a chunk window (adjacent chunks overlap by 2x this)
    pub sentence_padding: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            sentence_padding: 1,
        }
    }
}

/// Query-time limits and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum prompt size in bytes; larger prompts are rejected before
    /// any retrieval or generation call
    pub max_prompt_bytes: usize,
    /// Number of chunks to retrieve per query
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_prompt_bytes: 1024,
            top_k: 5,
        }
    }
}

/// Retrieval backend (external vector/index service) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Base URL of the retrieval service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9470".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generation service
    pub base_url: String,
    /// Model used when neither the engine nor the caller picks one
    pub default_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "llama3.2:3b".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

/// Source fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint serving CSV exports for query/tabular (`bq://`) sources;
    /// the table name plus `.csv` is appended
    pub table_export_url: String,
    /// Timeout for web and export downloads in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            table_export_url: "http://localhost:9471/tables".to_string(),
            fetch_timeout_secs: 120,
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Root directory for per-build scratch directories
    pub scratch_root: PathBuf,
    /// Root directory backing the filesystem object store
    /// (one subdirectory per bucket)
    pub object_store_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("corpus-rag");

        Self {
            database_path: data_dir.join("corpus.db"),
            scratch_root: std::env::temp_dir().join("corpus-rag"),
            object_store_root: data_dir.join("buckets"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.sentence_padding, 1);
        assert_eq!(config.query.max_prompt_bytes, 1024);
        assert!(config.query.top_k > 0);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            enable_cors = false

            [chunking]
            sentence_padding = 2
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.chunking.sentence_padding, 2);
        assert_eq!(parsed.query.top_k, AppConfig::default().query.top_k);
    }
}

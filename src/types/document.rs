//! Document and chunk models

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Recognized source document formats, dispatched by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    /// Plain text
    Text,
    /// HTML document; markup is stripped by the normalizer, not the reader
    Html,
    /// Tabular data, one unit per row
    Csv,
    /// PDF, one unit per page
    Pdf,
    /// Word-processor document
    Docx,
    /// Slide deck, one unit per slide
    Slides,
}

impl DocFormat {
    /// Detect format from a document name's extension
    pub fn from_name(doc_name: &str) -> Option<Self> {
        let extension = doc_name.rsplit('.').next().unwrap_or("").to_lowercase();
        match extension.as_str() {
            "txt" | "text" => Some(Self::Text),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" | "ppt" | "pptm" => Some(Self::Slides),
            _ => None,
        }
    }
}

/// A fetched source file staged in local scratch storage, ready for reading
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Display name (used for format detection)
    pub doc_name: String,
    /// Public source URL recorded on the document row
    pub src_url: String,
    /// Path of the downloaded copy inside the build's scratch directory
    pub local_path: PathBuf,
    /// Canonical remote path (e.g. gs:// URI), when the source has one
    pub remote_path: Option<String>,
}

/// One ingested source file belonging to exactly one engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDocument {
    /// Unique document ID
    pub id: Uuid,
    /// Owning engine
    pub engine_id: Uuid,
    /// Source URL; `(engine_id, doc_url)` is unique
    pub doc_url: String,
    /// Locator of a combined index artifact, when the backend produces one
    pub index_file: Option<String>,
    /// Byte offsets into the combined index artifact
    pub index_start: Option<i64>,
    pub index_end: Option<i64>,
    /// Ingestion timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl QueryDocument {
    /// Create a new document record for an engine
    pub fn new(engine_id: Uuid, doc_url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine_id,
            doc_url,
            index_file: None,
            index_start: None,
            index_end: None,
            created_at: chrono::Utc::now(),
        }
    }
}

/// One retrievable unit of text; never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDocumentChunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Owning engine
    pub engine_id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// Position in the engine's chunk sequence; contiguous from 0 at the
    /// time of a completed build
    pub index: u32,
    /// Sentence-window text handed to the retrieval backend
    pub text: String,
    /// Cleaned text for display
    pub clean_text: String,
    /// Sentences inside the window
    pub sentences: Vec<String>,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl QueryDocumentChunk {
    /// Create a chunk record at the given engine-wide index
    pub fn new(
        engine_id: Uuid,
        document_id: Uuid,
        index: u32,
        text: String,
        clean_text: String,
        sentences: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine_id,
            document_id,
            index,
            text,
            clean_text,
            sentences,
            created_at: chrono::Utc::now(),
        }
    }
}

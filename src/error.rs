//! Error types for the query engine service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Query engine service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request payload (bad locator, empty prompt, duplicate name)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Prompt exceeds the configured payload limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Source locator resolved to zero documents
    #[error("No documents indexed: {0}")]
    NoDocumentsIndexed(String),

    /// Document extension not recognized by any reader
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Document read/parse error
    #[error("Failed to read document '{doc_name}': {message}")]
    DocumentRead { doc_name: String, message: String },

    /// Persistence layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Retrieval or generation backend failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error talking to a backend
    #[error("Upstream request error: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl Error {
    /// Create a document read error
    pub fn document_read(doc_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DocumentRead {
            doc_name: doc_name.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg.clone(),
            ),
            Error::NoDocumentsIndexed(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_documents_indexed",
                msg.clone(),
            ),
            Error::UnsupportedFormat(msg) => {
                (StatusCode::BAD_REQUEST, "unsupported_format", msg.clone())
            }
            Error::DocumentRead { doc_name, message } => (
                StatusCode::BAD_REQUEST,
                "document_read_error",
                format!("Failed to read '{}': {}", doc_name, message),
            ),
            Error::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                msg.clone(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Upstream(err) => (StatusCode::BAD_GATEWAY, "upstream_error", err.to_string()),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

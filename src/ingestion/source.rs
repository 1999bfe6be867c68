//! Source locator resolution
//!
//! Resolves a locator string into locally staged document files inside a
//! build-owned scratch directory. Bucket locators enumerate every object
//! under the prefix and flatten nested paths by file name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::providers::object_store::ObjectStore;
use crate::types::SourceDocument;

/// A parsed source locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Object-storage bucket with an optional prefix (`gs://bucket/prefix`)
    Bucket { bucket: String, prefix: String },
    /// Single web document (`http://` / `https://`)
    Web { url: String },
    /// Query/tabular source exported as CSV (`bq://dataset.table`)
    Table { table: String },
    /// Mounted file share (`share://path`)
    Share { path: PathBuf },
}

impl SourceLocator {
    /// Parse a locator string, rejecting unrecognized schemes before any I/O
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("gs://") {
            let (bucket, prefix) = match rest.split_once('/') {
                Some((bucket, prefix)) => (bucket, prefix),
                None => (rest, ""),
            };
            if bucket.is_empty() {
                return Err(Error::Validation(format!("invalid bucket locator: {}", raw)));
            }
            return Ok(Self::Bucket {
                bucket: bucket.to_string(),
                prefix: prefix.trim_end_matches('/').to_string(),
            });
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Web {
                url: raw.to_string(),
            });
        }

        if let Some(table) = raw.strip_prefix("bq://") {
            if table.is_empty() {
                return Err(Error::Validation(format!("invalid table locator: {}", raw)));
            }
            return Ok(Self::Table {
                table: table.to_string(),
            });
        }

        if let Some(path) = raw.strip_prefix("share://") {
            if path.is_empty() {
                return Err(Error::Validation(format!("invalid share locator: {}", raw)));
            }
            return Ok(Self::Share {
                path: PathBuf::from(path),
            });
        }

        Err(Error::Validation(format!(
            "doc_url must start with gs://, http://, https://, bq://, or share://: {}",
            raw
        )))
    }
}

/// Resolves locators into locally staged [`SourceDocument`]s
pub struct SourceFetcher {
    object_store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    table_export_url: String,
}

impl SourceFetcher {
    /// Create a fetcher over the given object store
    pub fn new(object_store: Arc<dyn ObjectStore>, sources: &SourceConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(sources.fetch_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            object_store,
            http,
            table_export_url: sources.table_export_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `doc_url` into documents staged under `scratch`.
    ///
    /// Fails with [`Error::NoDocumentsIndexed`] when the locator resolves to
    /// nothing; an empty engine is never created silently. The caller owns
    /// `scratch` and is responsible for tearing it down.
    pub async fn fetch(&self, doc_url: &str, scratch: &Path) -> Result<Vec<SourceDocument>> {
        let locator = SourceLocator::parse(doc_url)?;

        let documents = match locator {
            SourceLocator::Bucket { bucket, prefix } => {
                self.fetch_bucket(&bucket, &prefix, scratch).await?
            }
            SourceLocator::Web { url } => self.fetch_web(&url, scratch).await?,
            SourceLocator::Table { table } => self.fetch_table(&table, scratch).await?,
            SourceLocator::Share { path } => self.fetch_share(&path, scratch)?,
        };

        if documents.is_empty() {
            return Err(Error::NoDocumentsIndexed(format!(
                "No documents can be indexed at url {}",
                doc_url
            )));
        }

        Ok(documents)
    }

    /// Download every object under the prefix, flattening nested paths into
    /// the scratch directory by file name
    async fn fetch_bucket(
        &self,
        bucket: &str,
        prefix: &str,
        scratch: &Path,
    ) -> Result<Vec<SourceDocument>> {
        tracing::info!("downloading bucket {} prefix '{}'", bucket, prefix);

        let mut documents = Vec::new();
        for object in self.object_store.list_objects(bucket, prefix).await? {
            let file_name = Path::new(&object.name)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| object.name.clone());
            if file_name.is_empty() {
                continue;
            }

            let local_path = scratch.join(&file_name);
            self.object_store
                .download(bucket, &object.name, &local_path)
                .await?;

            documents.push(SourceDocument {
                doc_name: file_name,
                src_url: object.public_url,
                local_path,
                remote_path: Some(object.canonical_path),
            });
        }

        Ok(documents)
    }

    /// Download a single web document
    async fn fetch_web(&self, url: &str, scratch: &Path) -> Result<Vec<SourceDocument>> {
        tracing::info!("downloading web document {}", url);

        let response = self.http.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let doc_name = web_document_name(url, &content_type);
        let body = response.bytes().await?;

        let local_path = scratch.join(&doc_name);
        std::fs::write(&local_path, &body)?;

        Ok(vec![SourceDocument {
            doc_name,
            src_url: url.to_string(),
            local_path,
            remote_path: None,
        }])
    }

    /// Export a table as CSV through the configured tabular export endpoint
    async fn fetch_table(&self, table: &str, scratch: &Path) -> Result<Vec<SourceDocument>> {
        let url = format!("{}/{}.csv", self.table_export_url, table);
        tracing::info!("exporting table {} via {}", table, url);

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let doc_name = format!("{}.csv", table);
        let local_path = scratch.join(&doc_name);
        std::fs::write(&local_path, &body)?;

        Ok(vec![SourceDocument {
            doc_name,
            src_url: format!("bq://{}", table),
            local_path,
            remote_path: None,
        }])
    }

    /// Copy every regular file under a mounted share into scratch
    fn fetch_share(&self, root: &Path, scratch: &Path) -> Result<Vec<SourceDocument>> {
        if !root.is_dir() {
            return Err(Error::Validation(format!(
                "share path is not a directory: {}",
                root.display()
            )));
        }

        let mut documents = Vec::new();
        for entry in walkdir::WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| Error::Internal(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            let local_path = scratch.join(&file_name);
            std::fs::copy(entry.path(), &local_path)?;

            documents.push(SourceDocument {
                doc_name: file_name,
                src_url: format!("share://{}", entry.path().display()),
                local_path,
                remote_path: None,
            });
        }

        Ok(documents)
    }
}

/// Derive a staged file name for a web document, appending an extension
/// from the content type when the URL path has none recognizable
fn web_document_name(url: &str, content_type: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let path_part = without_scheme.split(['?', '#']).next().unwrap_or("");
    let last_segment = path_part.trim_end_matches('/').rsplit('/').next().unwrap_or("");

    let base = if !path_part.contains('/') || last_segment.is_empty() {
        "document".to_string()
    } else {
        last_segment.to_string()
    };

    // already carries a known extension?
    if mime_guess::from_path(&base).first().is_some() {
        return base;
    }

    let extension = match content_type.split(';').next().unwrap_or("").trim() {
        "text/html" => "html",
        "text/csv" => "csv",
        "application/pdf" => "pdf",
        _ => "txt",
    };

    format!("{}.{}", base, extension)
}

//! Google Cloud Storage object store (behind the `gcp` feature)

use async_trait::async_trait;
use std::path::Path;

use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;

use crate::error::{Error, Result};

use super::object_store::{ObjectHandle, ObjectStore};

/// Object store backed by Google Cloud Storage
pub struct GcsObjectStore {
    client: GcsClient,
}

impl GcsObjectStore {
    /// Create a client using ambient application-default credentials
    pub async fn new() -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| Error::Config(format!("failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
        })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectHandle>> {
        let mut handles = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: if prefix.is_empty() {
                    None
                } else {
                    Some(prefix.to_string())
                },
                page_token: page_token.clone(),
                ..Default::default()
            };

            let listing = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| Error::Internal(format!("failed to list GCS objects: {}", e)))?;

            for item in listing.items.unwrap_or_default() {
                handles.push(ObjectHandle {
                    public_url: format!("https://storage.googleapis.com/{}/{}", bucket, item.name),
                    canonical_path: format!("gs://{}/{}", bucket, item.name),
                    name: item.name,
                });
            }

            page_token = listing.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(handles)
    }

    async fn download(&self, bucket: &str, name: &str, dest: &Path) -> Result<()> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: bucket.to_string(),
                    object: name.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| Error::Internal(format!("failed to download from GCS: {}", e)))?;

        tokio::fs::write(dest, data).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "gcs"
    }
}

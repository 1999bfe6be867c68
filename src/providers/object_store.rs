//! Object store provider for bucket-style document sources

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One listed object in a bucket
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    /// Object name relative to the bucket (may contain slashes)
    pub name: String,
    /// Public URL recorded on document rows
    pub public_url: String,
    /// Canonical remote path (e.g. a gs:// URI)
    pub canonical_path: String,
}

/// Listing and download over bucket-style storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object under the prefix
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectHandle>>;

    /// Download one object to a local path
    async fn download(&self, bucket: &str, name: &str, dest: &Path) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Filesystem-backed object store: each bucket is a subdirectory of the
/// configured root. Used for local deployments and tests.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at the given directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectHandle>> {
        let bucket_dir = self.bucket_dir(bucket);
        if !bucket_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in walkdir::WalkDir::new(&bucket_dir).follow_links(false) {
            let entry = entry.map_err(|e| Error::Internal(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry
                .path()
                .strip_prefix(&bucket_dir)
                .map_err(|e| Error::Internal(e.to_string()))?
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");

            if !prefix.is_empty() && !name.starts_with(prefix) {
                continue;
            }

            objects.push(ObjectHandle {
                public_url: format!("file://{}", entry.path().display()),
                canonical_path: format!("fs://{}/{}", bucket, name),
                name,
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn download(&self, bucket: &str, name: &str, dest: &Path) -> Result<()> {
        let src = self.bucket_dir(bucket).join(name);
        std::fs::copy(&src, dest)
            .map_err(|e| Error::Internal(format!("failed to stage {}: {}", src.display(), e)))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "fs"
    }
}

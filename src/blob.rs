//! Filesystem-backed content-addressable blob storage.
//!
//! Each blob lives at `<root>/<sha256-hex>.<ext>`. Writes go through
//! [`write_atomic`], so a concurrent reader never sees a truncated image,
//! and a key that already exists is never written again.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use catalog_store_core::models::is_valid_extension;
use catalog_store_core::store::BlobStore;
use catalog_store_core::{BlobRef, CatalogError, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::atomic::{sweep_temp_files, write_atomic};

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    extension: String,
}

impl FsBlobStore {
    /// Open (creating if needed) a blob directory and clear out temporary
    /// files abandoned by an interrupted process.
    pub async fn open(root: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let extension = extension.into();
        if !is_valid_extension(&extension) {
            return Err(CatalogError::validation("extension", "invalid blob extension"));
        }
        fs::create_dir_all(&root).await?;
        let swept = sweep_temp_files(&root).await?;
        if swept > 0 {
            info!(root = %root.display(), swept, "removed abandoned temporary blobs");
        }
        Ok(Self { root, extension })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, blob: &BlobRef) -> PathBuf {
        self.root.join(blob.as_str())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        let blob = BlobRef::for_content(bytes, &self.extension);
        let path = self.path_for(&blob);
        if fs::try_exists(&path).await? {
            debug!(blob = %blob, "blob already stored");
            return Ok(blob);
        }
        // Two racing writers of the same content both rename identical bytes
        // into place; either result is the same blob.
        write_atomic(&path, bytes).await?;
        debug!(blob = %blob, size = bytes.len(), "stored blob");
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(blob)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob: &BlobRef) -> bool {
        matches!(fs::try_exists(self.path_for(blob)).await, Ok(true))
    }

    async fn remove(&self, blob: &BlobRef) -> Result<()> {
        match fs::remove_file(self.path_for(blob)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<BlobRef>> {
        let mut blobs = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(blob) = BlobRef::parse(&name) {
                if blob.extension() == self.extension {
                    blobs.push(blob);
                }
            }
        }
        blobs.sort();
        Ok(blobs)
    }
}

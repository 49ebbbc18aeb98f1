//! On-disk blob storage.
//!
//! Each cached URL maps to exactly one file under the blob root, named after
//! the URL's SHA-256. Writes land in a temporary sibling first and are renamed
//! into place, so a reader either sees the previous file or the complete new
//! one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::hash::compute_blob_key;
use crate::Error;

const BLOB_EXTENSION: &str = "blob";

/// Filesystem store for raw image bytes.
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl BlobStore {
    /// Open a blob store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::Storage(format!("create {}: {e}", root.display())))?;
        Ok(Self { root, tmp_seq: AtomicU64::new(0) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic on-disk location for a URL.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(format!("{}.{BLOB_EXTENSION}", compute_blob_key(url)))
    }

    /// Persist `bytes` for `url`, replacing any previous blob.
    ///
    /// Returns the final path; the stored size is `bytes.len()`.
    pub async fn write(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
        let path = self.path_for(url);
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(
            ".{}.{}-{seq}.tmp",
            compute_blob_key(url),
            std::process::id()
        ));

        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage(format!("write {}: {e}", tmp.display())));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage(format!("rename into {}: {e}", path.display())));
        }

        Ok(path)
    }

    /// Read a blob. Returns None if the file does not exist.
    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Option<Bytes>, Error> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    /// Whether a regular file exists at `path`.
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        tokio::fs::metadata(path.as_ref())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Remove a blob.
    ///
    /// Idempotent: a missing file counts as success. Returns false only when
    /// the filesystem reports some other error.
    pub async fn delete(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete blob");
                false
            }
        }
    }

    /// Total size of regular files directly under the root.
    ///
    /// Diagnostic only: counts whatever is on disk, including orphans the
    /// index no longer knows about.
    pub async fn size_of_root(&self) -> Result<u64, Error> {
        let mut total = 0u64;
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

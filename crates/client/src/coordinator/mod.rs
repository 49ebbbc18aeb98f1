//! Image cache coordinator.
//!
//! Ties the index, the blob store and the origin together:
//!
//! - `lookup`: disk only. A row whose blob has gone missing is purged on the
//!   spot and reported as a miss. Hits are never revalidated.
//! - `fetch_and_cache`: one flight per URL at a time. Sends the stored
//!   validator as a precondition, keeps the blob on 304, replaces it on 200,
//!   then evicts if the index total went over budget.
//! - Every failure on these two paths is logged and turned into `None`; the
//!   caller falls back to loading without the cache.

mod evict;
pub mod locks;

pub use evict::EvictionReport;
pub use locks::UrlLocks;

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use posterframe_core::cache::entries;
use posterframe_core::{BlobStore, CacheDb, CacheEntry, CacheSettings, CacheStats, Category, Error};

use crate::origin::{ImageOrigin, OriginResponse};
use locks::Entry;

/// Disk-backed image cache in front of an [`ImageOrigin`].
pub struct ImageCache {
    db: CacheDb,
    blobs: BlobStore,
    origin: Arc<dyn ImageOrigin>,
    settings: CacheSettings,
    locks: UrlLocks,
}

impl ImageCache {
    pub fn new(db: CacheDb, blobs: BlobStore, origin: Arc<dyn ImageOrigin>, settings: CacheSettings) -> Self {
        Self { db, blobs, origin, settings, locks: UrlLocks::new() }
    }

    pub fn index(&self) -> &CacheDb {
        &self.db
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Where the blob for `url` lives (or would live) on disk.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.blobs.path_for(url)
    }

    /// Serve `url` from disk without touching the network.
    pub async fn lookup(&self, url: &str) -> Option<Bytes> {
        match self.try_lookup(url).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn try_lookup(&self, url: &str) -> Result<Option<Bytes>, Error> {
        let Some(entry) = self.db.get_entry(url).await? else {
            return Ok(None);
        };

        let Some(bytes) = self.blobs.read(&entry.local_path).await? else {
            tracing::debug!(url = %url, path = %entry.local_path, "blob missing, purging index entry");
            self.db.delete_entry_if_fetched_at(url, entry.fetched_at).await?;
            return Ok(None);
        };

        if let Err(e) = self.db.touch_entry(url, entries::now()).await {
            tracing::warn!(url = %url, error = %e, "failed to record cache access");
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "cache hit");
        Ok(Some(bytes))
    }

    /// Fetch `url` through the cache, revalidating any stored copy.
    ///
    /// Concurrent calls for the same URL collapse into one origin request;
    /// callers that queued behind it get its result without a request of
    /// their own.
    pub async fn fetch_and_cache(
        &self, url: &str, entity_id: Option<&str>, category: Category, note: Option<&str>,
    ) -> Option<Bytes> {
        let slot = self.locks.slot(url).await;

        let flight = match slot.enter().await {
            Entry::Lead(flight) => flight,
            Entry::Shared { failed: true } => {
                tracing::debug!(url = %url, "concurrent fetch failed, sharing its outcome");
                return None;
            }
            Entry::Shared { failed: false } => return self.lookup(url).await,
        };

        let result = match self.revalidate(url, entity_id, category, note).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "image fetch failed");
                None
            }
        };

        flight.finish(result.is_none());
        result
    }

    async fn revalidate(
        &self, url: &str, entity_id: Option<&str>, category: Category, note: Option<&str>,
    ) -> Result<Bytes, Error> {
        let prior = match self.db.get_entry(url).await? {
            Some(entry) if self.blobs.exists(&entry.local_path).await => Some(entry),
            Some(entry) => {
                tracing::debug!(url = %url, path = %entry.local_path, "blob missing, purging index entry");
                self.db.delete_entry_if_fetched_at(url, entry.fetched_at).await?;
                None
            }
            None => None,
        };

        let validator = prior.as_ref().and_then(|e| e.validator.as_deref());
        let response = self.origin.fetch(url, validator).await?;

        match response {
            OriginResponse::NotModified { validator } => {
                let Some(entry) = prior else {
                    return Err(Error::HttpError(format!("304 for {url} without a cached copy")));
                };
                self.keep_current(entry, validator).await
            }
            OriginResponse::Fresh { bytes, validator } => {
                let entry = self.store(url, &bytes, validator, prior, entity_id, category, note).await?;
                tracing::debug!(url = %url, bytes = entry.size_bytes, "cached fresh image");

                let report = self.evict_protecting(Some(url)).await;
                if report.evicted > 0 || report.failed > 0 {
                    tracing::info!(
                        evicted = report.evicted,
                        freed_bytes = report.freed_bytes,
                        failed = report.failed,
                        "evicted least recently used images"
                    );
                }

                Ok(bytes)
            }
        }
    }

    /// 304 path: keep the blob, refresh recency and the validator.
    async fn keep_current(&self, mut entry: CacheEntry, validator: Option<String>) -> Result<Bytes, Error> {
        let Some(bytes) = self.blobs.read(&entry.local_path).await? else {
            self.db.delete_entry_if_fetched_at(&entry.url, entry.fetched_at).await?;
            return Err(Error::Storage(format!("blob for {} vanished during revalidation", entry.url)));
        };

        entry.last_accessed_at = entries::now();
        if validator.is_some() {
            entry.validator = validator;
        }
        if let Err(e) = self.db.upsert_entry(&entry).await {
            tracing::warn!(url = %entry.url, error = %e, "failed to record revalidation");
        }

        tracing::debug!(url = %entry.url, "origin confirmed cached copy");
        Ok(bytes)
    }

    /// 200 path: write the blob, then the row. A row is only written once the
    /// blob is safely on disk.
    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self, url: &str, bytes: &Bytes, validator: Option<String>, prior: Option<CacheEntry>,
        entity_id: Option<&str>, category: Category, note: Option<&str>,
    ) -> Result<CacheEntry, Error> {
        let path = self.blobs.write(url, bytes).await?;

        let (prior_entity, prior_note) = prior.map(|p| (p.entity_id, p.note)).unwrap_or_default();
        let at = entries::now();
        let entry = CacheEntry {
            url: url.to_string(),
            local_path: path.to_string_lossy().into_owned(),
            entity_id: entity_id.map(String::from).or(prior_entity),
            category,
            fetched_at: at,
            validator,
            size_bytes: bytes.len() as u64,
            last_accessed_at: at,
            note: note.map(String::from).or(prior_note),
        };

        if let Err(e) = self.db.upsert_entry(&entry).await {
            self.blobs.delete(&path).await;
            return Err(e);
        }

        Ok(entry)
    }

    /// Drop every cached image for an entity, optionally one category only.
    ///
    /// Returns the number of index rows removed. Entries whose blob cannot be
    /// deleted are kept.
    pub async fn invalidate(&self, entity_id: &str, category: Option<Category>) -> Result<u64, Error> {
        let victims = self.db.entries_by_entity(entity_id, category).await?;
        let mut removed = 0u64;
        for victim in &victims {
            // Keep the row while its blob is still on disk.
            if self.blobs.delete(&victim.local_path).await && self.db.delete_entry(&victim.url).await? {
                removed += 1;
            }
        }

        tracing::info!(
            entity_id = %entity_id,
            category = category.map(|c| c.as_str()).unwrap_or("*"),
            removed,
            "invalidated cached images"
        );
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<CacheStats, Error> {
        self.db.stats().await
    }
}

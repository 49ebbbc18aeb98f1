//! Loader interceptor.
//!
//! Sits in front of an image-loading pipeline's network stage. A request is
//! served from disk when possible, then through the cache coordinator, and
//! only handed to the next stage when both come back empty.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use posterframe_core::{Category, Error};
use serde::{Deserialize, Serialize};

use crate::coordinator::ImageCache;

/// One image the pipeline wants loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub url: String,
    pub entity_id: Option<String>,
    pub category: Category,
    pub note: Option<String>,
}

impl ImageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), entity_id: None, category: Category::default(), note: None }
    }

    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Where the bytes of a [`LoadedImage`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Served from the blob store without a network round trip.
    Disk,
    /// Fetched or revalidated through the cache.
    Network,
    /// The cache could not help; the next stage loaded it uncached.
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub bytes: Bytes,
    pub provenance: Provenance,
}

/// A stage of the image-loading pipeline.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, request: &ImageRequest) -> Result<Bytes, Error>;
}

/// Cache-first loader that defers to `next` when the cache has nothing.
pub struct LoaderInterceptor {
    cache: Arc<ImageCache>,
    next: Arc<dyn ImageLoader>,
}

impl LoaderInterceptor {
    pub fn new(cache: Arc<ImageCache>, next: Arc<dyn ImageLoader>) -> Self {
        Self { cache, next }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Load an image, reporting which layer produced it.
    ///
    /// Cache faults never surface here; only a failure of the next stage does.
    pub async fn load(&self, request: &ImageRequest) -> Result<LoadedImage, Error> {
        if let Some(bytes) = self.cache.lookup(&request.url).await {
            return Ok(LoadedImage { bytes, provenance: Provenance::Disk });
        }

        let fetched = self
            .cache
            .fetch_and_cache(
                &request.url,
                request.entity_id.as_deref(),
                request.category,
                request.note.as_deref(),
            )
            .await;
        if let Some(bytes) = fetched {
            return Ok(LoadedImage { bytes, provenance: Provenance::Network });
        }

        tracing::debug!(url = %request.url, "cache unavailable, passing through");
        let bytes = self.next.load(request).await?;
        Ok(LoadedImage { bytes, provenance: Provenance::PassThrough })
    }
}

#[async_trait]
impl ImageLoader for LoaderInterceptor {
    async fn load(&self, request: &ImageRequest) -> Result<Bytes, Error> {
        LoaderInterceptor::load(self, request).await.map(|loaded| loaded.bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use posterframe_core::{BlobStore, CacheDb, CacheSettings};
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{FixedLoader, Reply, ScriptedOrigin};

    const THUMB: &str = "https://img.example.com/thumb/42.png";

    async fn interceptor(
        origin: Arc<ScriptedOrigin>, next: Arc<FixedLoader>,
    ) -> (LoaderInterceptor, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        let cache = ImageCache::new(db, blobs, origin, CacheSettings::new(10_000, 0.8));
        (LoaderInterceptor::new(Arc::new(cache), next), dir)
    }

    #[test]
    fn test_request_builder() {
        let request = ImageRequest::new(THUMB).entity("video-42").category(Category::Thumbnail).note("grid");
        assert_eq!(request.url, THUMB);
        assert_eq!(request.entity_id.as_deref(), Some("video-42"));
        assert_eq!(request.category, Category::Thumbnail);
        assert_eq!(request.note.as_deref(), Some("grid"));

        assert_eq!(ImageRequest::new(THUMB).category, Category::Other);
    }

    #[test]
    fn test_provenance_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Provenance::PassThrough).unwrap(), "\"pass_through\"");
        assert_eq!(serde_json::to_string(&Provenance::Disk).unwrap(), "\"disk\"");
    }

    #[tokio::test]
    async fn test_network_then_disk() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.reply(THUMB, Reply::body(b"png"));
        let next = Arc::new(FixedLoader::default());
        let (loader, _dir) = interceptor(origin.clone(), next.clone()).await;
        let request = ImageRequest::new(THUMB).entity("video-42").category(Category::Thumbnail);

        let first = loader.load(&request).await.unwrap();
        assert_eq!(first.provenance, Provenance::Network);
        assert_eq!(first.bytes, Bytes::from_static(b"png"));

        let second = loader.load(&request).await.unwrap();
        assert_eq!(second.provenance, Provenance::Disk);
        assert_eq!(second.bytes, first.bytes);

        assert_eq!(origin.calls(), 1);
        assert_eq!(next.calls.load(Ordering::SeqCst), 0);

        let entry = loader.cache().index().get_entry(THUMB).await.unwrap().unwrap();
        assert_eq!(entry.category, Category::Thumbnail);
        assert_eq!(entry.entity_id.as_deref(), Some("video-42"));
    }

    #[tokio::test]
    async fn test_disk_hit_is_not_revalidated() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.reply(THUMB, Reply::body_with_validator(b"old", "v1"));
        let (loader, _dir) = interceptor(origin.clone(), Arc::new(FixedLoader::default())).await;
        let request = ImageRequest::new(THUMB);

        loader.load(&request).await.unwrap();
        origin.reply(THUMB, Reply::body(b"new"));

        let hit = loader.load(&request).await.unwrap();
        assert_eq!(hit.provenance, Provenance::Disk);
        assert_eq!(hit.bytes, Bytes::from_static(b"old"));
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_pass_through_when_cache_fails() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.reply(THUMB, Reply::Fail);
        let next = Arc::new(FixedLoader { body: Some(Bytes::from_static(b"direct")), ..Default::default() });
        let (loader, _dir) = interceptor(origin, next.clone()).await;

        let loaded = loader.load(&ImageRequest::new(THUMB)).await.unwrap();
        assert_eq!(loaded.provenance, Provenance::PassThrough);
        assert_eq!(loaded.bytes, Bytes::from_static(b"direct"));
        assert_eq!(next.calls.load(Ordering::SeqCst), 1);
        assert!(loader.cache().lookup(THUMB).await.is_none());
    }

    #[tokio::test]
    async fn test_next_stage_failure_surfaces() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.reply(THUMB, Reply::Fail);
        let (loader, _dir) = interceptor(origin, Arc::new(FixedLoader::default())).await;

        let err = loader.load(&ImageRequest::new(THUMB)).await.unwrap_err();
        assert!(matches!(err, Error::HttpError(_)));
    }

    #[tokio::test]
    async fn test_chains_as_image_loader() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.reply(THUMB, Reply::body(b"png"));
        let (loader, _dir) = interceptor(origin, Arc::new(FixedLoader::default())).await;

        let stage: &dyn ImageLoader = &loader;
        assert_eq!(stage.load(&ImageRequest::new(THUMB)).await.unwrap(), Bytes::from_static(b"png"));
    }
}

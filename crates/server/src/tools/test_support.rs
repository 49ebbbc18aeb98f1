//! Fixtures shared by tool tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use posterframe_client::{ImageCache, ImageLoader, ImageOrigin, ImageRequest, LoaderInterceptor, OriginResponse};
use posterframe_core::{BlobStore, CacheDb, CacheSettings, Error};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use tempfile::TempDir;

/// Origin and next stage in one: serves whatever bodies were registered.
#[derive(Default)]
pub struct StaticOrigin {
    bodies: Mutex<HashMap<String, Bytes>>,
}

impl StaticOrigin {
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies.lock().unwrap().insert(url.to_string(), Bytes::copy_from_slice(body));
    }

    fn body(&self, url: &str) -> Result<Bytes, Error> {
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::HttpError(format!("status 404 for {url}")))
    }
}

#[async_trait]
impl ImageOrigin for StaticOrigin {
    async fn fetch(&self, url: &str, _validator: Option<&str>) -> Result<OriginResponse, Error> {
        Ok(OriginResponse::Fresh { bytes: self.body(url)?, validator: None })
    }
}

#[async_trait]
impl ImageLoader for StaticOrigin {
    async fn load(&self, request: &ImageRequest) -> Result<Bytes, Error> {
        self.body(&request.url)
    }
}

pub struct Fixture {
    pub origin: Arc<StaticOrigin>,
    pub cache: Arc<ImageCache>,
    pub loader: LoaderInterceptor,
    _dir: TempDir,
}

pub async fn fixture(budget_bytes: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let origin = Arc::new(StaticOrigin::default());
    let db = CacheDb::open_in_memory().await.unwrap();
    let blobs = BlobStore::open(dir.path().join("blobs")).await.unwrap();
    let cache = Arc::new(ImageCache::new(
        db,
        blobs,
        origin.clone(),
        CacheSettings::new(budget_bytes, 0.8),
    ));
    let loader = LoaderInterceptor::new(cache.clone(), origin.clone());
    Fixture { origin, cache, loader, _dir: dir }
}

/// Decode the JSON text content of a tool result.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}

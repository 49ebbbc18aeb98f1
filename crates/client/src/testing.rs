//! Scripted origin used by coordinator and interceptor tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use posterframe_core::Error;

use crate::interceptor::{ImageLoader, ImageRequest};
use crate::origin::{ImageOrigin, OriginResponse};

#[derive(Debug, Clone)]
pub enum Reply {
    Fresh { body: Bytes, validator: Option<String> },
    NotModified,
    Fail,
}

impl Reply {
    pub fn body(bytes: &[u8]) -> Self {
        Reply::Fresh { body: Bytes::copy_from_slice(bytes), validator: None }
    }

    pub fn body_with_validator(bytes: &[u8], validator: &str) -> Self {
        Reply::Fresh { body: Bytes::copy_from_slice(bytes), validator: Some(validator.to_string()) }
    }
}

/// Answers each URL with a fixed reply and records every call.
#[derive(Debug, Default)]
pub struct ScriptedOrigin {
    replies: Mutex<HashMap<String, Reply>>,
    validators_seen: Mutex<Vec<(String, Option<String>)>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn reply(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn validators_seen(&self) -> Vec<(String, Option<String>)> {
        self.validators_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageOrigin for ScriptedOrigin {
    async fn fetch(&self, url: &str, validator: Option<&str>) -> Result<OriginResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.validators_seen
            .lock()
            .unwrap()
            .push((url.to_string(), validator.map(String::from)));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Fresh { body, validator }) => Ok(OriginResponse::Fresh { bytes: body, validator }),
            Some(Reply::NotModified) => Ok(OriginResponse::NotModified { validator: None }),
            Some(Reply::Fail) | None => Err(Error::HttpError(format!("status 503 for {url}"))),
        }
    }
}

/// Pass-through stage that serves a fixed body or fails.
#[derive(Debug, Default)]
pub struct FixedLoader {
    pub body: Option<Bytes>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageLoader for FixedLoader {
    async fn load(&self, request: &ImageRequest) -> Result<Bytes, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body
            .clone()
            .ok_or_else(|| Error::HttpError(format!("direct load failed for {}", request.url)))
    }
}

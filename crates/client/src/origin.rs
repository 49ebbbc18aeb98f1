//! The origin server as seen by the cache coordinator.

use async_trait::async_trait;
use bytes::Bytes;
use posterframe_core::Error;

/// Outcome of a successful conditional GET.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginResponse {
    /// 304: the cached copy is still current. Carries a refreshed validator
    /// when the origin sent one.
    NotModified { validator: Option<String> },
    /// 200: a new body, with the origin's `Last-Modified` if present.
    Fresh { bytes: Bytes, validator: Option<String> },
}

/// Source of image bytes supporting conditional requests.
///
/// Implementations return `Err` for every status other than 200 and 304, and
/// for transport failures and timeouts.
#[async_trait]
pub trait ImageOrigin: Send + Sync {
    /// GET `url`, sending `validator` as `If-Modified-Since` when present.
    async fn fetch(&self, url: &str, validator: Option<&str>) -> Result<OriginResponse, Error>;
}

//! HTTP image fetch client.
//!
//! ### Conditional requests
//! - A known validator is sent as `If-Modified-Since`.
//! - `304 Not Modified` and `200 OK` are the only successful statuses; every
//!   other status is an error for the cache's purposes.
//! - The response's `Last-Modified` becomes the next validator.
//!
//! ### Limits
//! - Request timeout from configuration; a timeout is reported as
//!   `FETCH_TIMEOUT` and never retried here.
//! - Max body bytes per image (default 20MB).
//! - Max redirects: 5

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, validate_image_url};

use crate::interceptor::{ImageLoader, ImageRequest};
use crate::origin::{ImageOrigin, OriginResponse};
use posterframe_core::{AppConfig, Error};

const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/png,image/jpeg,image/*;q=0.8,*/*;q=0.5";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "posterframe/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "posterframe/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP client for image origins.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Conditional GET for an image.
    pub async fn fetch_conditional(&self, url_str: &str, validator: Option<&str>) -> Result<OriginResponse, Error> {
        let start = Instant::now();
        let url = validate_image_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut request = self.http.get(url.as_str()).header(header::ACCEPT, IMAGE_ACCEPT);
        if let Some(validator) = validator {
            request = request.header(header::IF_MODIFIED_SINCE, validator);
        }

        let response = request.send().await.map_err(|e| transport_error(&url, &e))?;
        let status = response.status();
        let next_validator = last_modified(response.headers());

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url = %url, fetch_ms = start.elapsed().as_millis() as u64, "origin reports not modified");
            return Ok(OriginResponse::NotModified { validator: next_validator });
        }

        if status != StatusCode::OK {
            return Err(Error::HttpError(format!("status {} for {url}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let bytes = response.bytes().await.map_err(|e| transport_error(&url, &e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            url = %url,
            fetch_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "fetched image"
        );

        Ok(OriginResponse::Fresh { bytes, validator: next_validator })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn last_modified(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn transport_error(url: &::url::Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::HttpError(format!("network error for {url}: {err}"))
    }
}

#[async_trait]
impl ImageOrigin for FetchClient {
    async fn fetch(&self, url: &str, validator: Option<&str>) -> Result<OriginResponse, Error> {
        self.fetch_conditional(url, validator).await
    }
}

/// Direct, uncached load: the stage the interceptor falls back to.
#[async_trait]
impl ImageLoader for FetchClient {
    async fn load(&self, request: &ImageRequest) -> Result<Bytes, Error> {
        match self.fetch_conditional(&request.url, None).await? {
            OriginResponse::Fresh { bytes, .. } => Ok(bytes),
            OriginResponse::NotModified { .. } => {
                Err(Error::HttpError(format!("unsolicited 304 for {}", request.url)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const STAMP: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    /// Minimal HTTP/1.1 origin. Each connection gets one response chosen by
    /// `respond` from the raw request text; requests are recorded.
    async fn spawn_origin(respond: fn(&str) -> String) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else { return };
                let mut raw = Vec::new();
                let mut buf = [0u8; 1024];
                while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&raw).to_string();
                log.lock().unwrap().push(request.clone());
                let _ = sock.write_all(respond(&request).as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });

        (format!("http://{addr}"), seen)
    }

    fn revalidating_origin(request: &str) -> String {
        let lowered = request.to_ascii_lowercase();
        if lowered.contains(&format!("if-modified-since: {}", STAMP.to_ascii_lowercase())) {
            "HTTP/1.1 304 Not Modified\r\nConnection: close\r\n\r\n".to_string()
        } else {
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nLast-Modified: {STAMP}\r\n\
                 Content-Length: 5\r\nConnection: close\r\n\r\nPIXEL"
            )
        }
    }

    fn missing_origin(_request: &str) -> String {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }

    fn oversized_origin(_request: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: 64\r\nConnection: close\r\n\r\n{}",
            "x".repeat(64)
        )
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "posterframe/0.1");
        assert_eq!(config.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "tester/2".into(), max_bytes: 1024, timeout_ms: 500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "tester/2");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_fresh_then_not_modified() {
        let (base, seen) = spawn_origin(revalidating_origin).await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let url = format!("{base}/poster.png");

        let first = client.fetch_conditional(&url, None).await.unwrap();
        assert_eq!(
            first,
            OriginResponse::Fresh { bytes: Bytes::from_static(b"PIXEL"), validator: Some(STAMP.to_string()) }
        );

        let second = client.fetch_conditional(&url, Some(STAMP)).await.unwrap();
        assert!(matches!(second, OriginResponse::NotModified { .. }));

        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].to_ascii_lowercase().contains("if-modified-since"));
        assert!(requests[1].to_ascii_lowercase().contains("if-modified-since"));
    }

    #[tokio::test]
    async fn test_other_status_is_error() {
        let (base, _) = spawn_origin(missing_origin).await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let result = client.fetch_conditional(&format!("{base}/gone.png"), None).await;
        assert!(matches!(result, Err(Error::HttpError(msg)) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_body_over_limit_rejected() {
        let (base, _) = spawn_origin(oversized_origin).await;
        let client = FetchClient::new(FetchConfig { max_bytes: 16, ..Default::default() }).unwrap();

        let result = client.fetch_conditional(&format!("{base}/big.png"), None).await;
        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_without_request() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch_conditional("ftp://img.example.com/p.png", None).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_fetch_timeout() {
        // Accepts the connection but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let client = FetchClient::new(FetchConfig { timeout: Duration::from_millis(200), ..Default::default() }).unwrap();
        let result = client.fetch_conditional(&format!("http://{addr}/slow.png"), None).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_loader_returns_body() {
        let (base, _) = spawn_origin(revalidating_origin).await;
        let client = FetchClient::new(FetchConfig::default()).unwrap();

        let bytes = client
            .load(&ImageRequest::new(format!("{base}/poster.png")))
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"PIXEL"));
    }
}

//! image_load tool implementation.
//!
//! Loads one image through the cache-first interceptor and reports where the
//! bytes came from. The image itself is not returned; `local_path` points at
//! the cached blob when there is one.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use posterframe_client::fetch::validate_image_url;
use posterframe_client::{ImageRequest, LoaderInterceptor, Provenance};
use posterframe_core::{Category, Error};

use super::json_result;

/// Input parameters for the image_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageLoadParams {
    /// The http(s) image URL. Used verbatim as the cache key.
    pub url: String,

    /// Owning entity (e.g. a video ID) for grouped invalidation.
    #[serde(default)]
    pub entity_id: Option<String>,

    /// Image category (default: "other").
    #[serde(default)]
    pub category: Option<Category>,

    /// Free-form annotation stored with the entry.
    #[serde(default)]
    pub note: Option<String>,
}

/// Output structure for the image_load tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageLoadOutput {
    pub url: String,
    /// "disk", "network" or "pass_through".
    pub provenance: Provenance,
    pub size_bytes: u64,
    /// Cached blob path; absent when the image bypassed the cache.
    pub local_path: Option<String>,
}

/// Implementation of the image_load tool.
pub async fn load_impl(loader: &LoaderInterceptor, params: ImageLoadParams) -> Result<CallToolResult, McpError> {
    validate_image_url(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let mut request = ImageRequest::new(&params.url).category(params.category.unwrap_or_default());
    request.entity_id = params.entity_id;
    request.note = params.note;

    let loaded = loader.load(&request).await?;
    tracing::debug!(url = %params.url, provenance = ?loaded.provenance, bytes = loaded.bytes.len(), "image loaded");

    let local_path = match loaded.provenance {
        Provenance::PassThrough => None,
        Provenance::Disk | Provenance::Network => {
            Some(loader.cache().path_for(&params.url).to_string_lossy().into_owned())
        }
    };

    json_result(&ImageLoadOutput {
        url: params.url,
        provenance: loaded.provenance,
        size_bytes: loaded.bytes.len() as u64,
        local_path,
    })
}

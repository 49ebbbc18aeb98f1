//! cache_invalidate tool implementation.
//!
//! Drops every cached image owned by an entity, optionally one category only.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use posterframe_client::ImageCache;
use posterframe_core::{Category, Error};

use crate::tools::json_result;

/// Parameters for the cache_invalidate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateParams {
    /// Owning entity whose images should be dropped.
    pub entity_id: String,

    /// Restrict to one category.
    #[serde(default)]
    pub category: Option<Category>,
}

/// Output from the cache_invalidate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInvalidateOutput {
    /// Number of index entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_invalidate tool.
pub async fn invalidate_impl(cache: &ImageCache, params: CacheInvalidateParams) -> Result<CallToolResult, McpError> {
    if params.entity_id.trim().is_empty() {
        return Err(Error::InvalidInput("entity_id cannot be empty".into()).into());
    }

    let deleted = cache.invalidate(&params.entity_id, params.category).await?;
    json_result(&CacheInvalidateOutput { deleted })
}

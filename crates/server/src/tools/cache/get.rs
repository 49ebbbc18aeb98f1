//! cache_get tool implementation.
//!
//! Lists index entries by URL, by owning entity or by category. Reading
//! entries does not count as an access for eviction purposes.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use posterframe_core::{CacheDb, CacheEntry, Category, Error};

use crate::tools::json_result;

/// Parameters for the cache_get tool. Exactly one selector is used:
/// `url`, else `entity_id` (optionally narrowed by `category`), else `category`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Exact image URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Owning entity ID.
    #[serde(default)]
    pub entity_id: Option<String>,

    /// Image category.
    #[serde(default)]
    pub category: Option<Category>,
}

/// Output from the cache_get tool, least recently accessed first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheGetOutput {
    pub entries: Vec<CacheEntry>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(db: &CacheDb, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let entries = match params {
        CacheGetParams { url: Some(url), .. } => {
            let entry = db.get_entry(&url).await?.ok_or_else(|| Error::CacheMiss(url.clone()))?;
            vec![entry]
        }
        CacheGetParams { entity_id: Some(entity_id), category, .. } => {
            db.entries_by_entity(&entity_id, category).await?
        }
        CacheGetParams { category: Some(category), .. } => db.entries_by_category(category).await?,
        _ => {
            return Err(Error::InvalidInput("one of url, entity_id or category must be specified".into()).into());
        }
    };

    json_result(&CacheGetOutput { entries })
}

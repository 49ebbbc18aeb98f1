//! cache_stats tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use posterframe_client::ImageCache;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    /// Entries in the index.
    pub entry_count: u64,
    /// Sum of recorded entry sizes; this is what eviction budgets against.
    pub total_size: u64,
    pub budget_bytes: u64,
    /// Bytes actually present in the blob directory, orphans included.
    pub disk_bytes: u64,
}

pub async fn stats_impl(cache: &ImageCache) -> Result<CallToolResult, McpError> {
    let stats = cache.stats().await?;
    let disk_bytes = cache.blobs().size_of_root().await?;

    json_result(&CacheStatsOutput {
        entry_count: stats.entry_count,
        total_size: stats.total_size,
        budget_bytes: cache.settings().budget_bytes,
        disk_bytes,
    })
}

//! MCP tool implementations.
//!
//! This module contains all tools exposed by the posterframe server.

pub mod cache;
pub mod image_load;

#[cfg(test)]
pub(crate) mod test_support;

pub use image_load::{ImageLoadParams, load_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use posterframe_core::Error;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

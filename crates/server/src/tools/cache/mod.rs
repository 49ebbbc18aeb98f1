//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and managing the image cache.

pub mod get;
pub mod invalidate;
pub mod stats;

pub use get::{CacheGetParams, get_impl};
pub use invalidate::{CacheInvalidateParams, invalidate_impl};
pub use stats::stats_impl;

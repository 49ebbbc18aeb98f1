//! Core types and storage for posterframe.
//!
//! This crate provides:
//! - The cache index (SQLite) and blob store (filesystem)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BlobStore, CacheDb, CacheEntry, CacheStats, Category};
pub use config::{AppConfig, CacheSettings, ConfigError};
pub use error::Error;

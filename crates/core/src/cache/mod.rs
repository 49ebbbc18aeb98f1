//! Disk-backed image cache storage.
//!
//! Two independent halves that the coordinator keeps in step:
//!
//! - [`CacheDb`]: SQLite index (tokio-rusqlite, WAL mode, versioned
//!   migrations) holding one [`CacheEntry`] per URL
//! - [`BlobStore`]: one file per URL under a dedicated directory, written via
//!   temp file + rename

pub mod blobs;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use blobs::BlobStore;
pub use connection::CacheDb;
pub use entries::{CacheEntry, CacheStats, Category};

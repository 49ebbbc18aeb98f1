//! Client side of posterframe.
//!
//! This crate provides the conditional HTTP fetch client, the cache
//! coordinator (single-flight fetches, LRU eviction, self-healing lookups)
//! and the loader interceptor that puts the cache in front of an image
//! pipeline.

pub mod coordinator;
pub mod fetch;
pub mod interceptor;
pub mod origin;

#[cfg(test)]
mod testing;

pub use coordinator::{EvictionReport, ImageCache};
pub use fetch::{FetchClient, FetchConfig};
pub use interceptor::{ImageLoader, ImageRequest, LoadedImage, LoaderInterceptor, Provenance};
pub use origin::{ImageOrigin, OriginResponse};

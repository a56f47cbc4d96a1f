//! ttl_cache - An embeddable in-memory cache with per-item expiration
//!
//! Provides concurrency-safe cache tables whose items expire after a period
//! of inactivity, with lifecycle callbacks, miss-time data loading and
//! access-frequency ranking.

pub mod cache;
pub mod error;
pub mod registry;

pub use cache::{AccessPair, CacheItem, CacheTable};
pub use error::{CacheError, Result};
pub use registry::CacheRegistry;

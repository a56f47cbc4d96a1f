//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache table operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Key not present in the table
    #[error("key not found in cache")]
    KeyNotFound,

    /// Key not present and the configured data loader produced no item
    #[error("key not found and could not be loaded into cache")]
    KeyNotFoundOrNotLoadable,
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

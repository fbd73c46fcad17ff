//! Best-effort key/value caching.
//!
//! Nothing in this module can fail a request: every operation resolves to a default
//! (`None` / `false`) when the backend is missing, unreachable or misbehaving.

pub mod backend;
pub mod cached;
pub mod service;

pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use cached::Cached;
pub use service::CacheService;

use super::config::ConfigError;

/// Failures inside the cache layer. Logged, never returned past [`CacheService`].
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cache connection: {0}")]
    Connect(String),

    #[error("cache command failed: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("cache value encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

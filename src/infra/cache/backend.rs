//! Key/value stores the cache service can sit on.

use super::CacheError;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MEMORY_URL: &str = "memory://";

/// Minimal string store with per-key expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether a key was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

/// Builds the backend selected by `url`: `memory://` or any `redis://` / `rediss://` URL.
pub async fn connect(url: &str) -> Result<Arc<dyn CacheBackend>, CacheError> {
    if url.starts_with(MEMORY_URL) {
        return Ok(Arc::new(MemoryBackend::new()));
    }
    Ok(Arc::new(RedisBackend::connect(url).await?))
}

/// Redis through a self-reconnecting multiplexed connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed = redis::cmd("DEL")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pong = redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheError::Connect(format!("unexpected PING reply '{}'", pong)))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Upper bound on entries held by [`MemoryBackend`].
pub const MEMORY_CAPACITY: u64 = 10_000;

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, (String, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &(String, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// In-process store for single-node development and tests.
pub struct MemoryBackend {
    entries: Cache<String, (String, Duration)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_CAPACITY)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|(v, _)| v))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), ttl))
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

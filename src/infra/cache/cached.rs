use super::CacheService;
use crate::crypto::hashing::cache_key;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

/// Read-through caching for a named operation.
///
/// ```ignore
/// let rows = Cached::new("collection", ttl)
///     .call(&cache, &json!({"table": "Thoughts"}), || crud.read_all("Thoughts"))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Cached {
    operation: String,
    ttl: Duration,
}

impl Cached {
    pub fn new(operation: impl Into<String>, ttl: Duration) -> Self {
        Self {
            operation: operation.into(),
            ttl,
        }
    }

    pub fn key(&self, args: &JsonValue) -> String {
        cache_key(&self.operation, args)
    }

    /// Returns the cached result for `args`, or runs `compute` and stores its result.
    ///
    /// Errors from `compute` are returned unchanged and never cached.
    pub async fn call<T, E, F, Fut>(
        &self,
        cache: &CacheService,
        args: &JsonValue,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key(args);
        if let Some(hit) = cache.get_json::<T>(&key).await {
            tracing::debug!(operation = %self.operation, %key, "cache hit");
            return Ok(hit);
        }

        let value = compute().await?;
        if !cache.set_json(&key, &value, self.ttl).await {
            tracing::debug!(operation = %self.operation, %key, "result not cached");
        }
        Ok(value)
    }

    /// Drops the cached result for `args`.
    pub async fn invalidate(&self, cache: &CacheService, args: &JsonValue) -> bool {
        cache.delete(&self.key(args)).await
    }
}

use super::backend::{self, CacheBackend};
use super::CacheError;
use crate::infra::config::CacheSettings;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Process-wide cache handle.
///
/// The backend is resolved at most once, either by [`CacheService::warm_up`] or by the first
/// operation. A failed resolution is remembered as "no client" until the process restarts.
pub struct CacheService {
    settings: CacheSettings,
    client: OnceCell<Option<Arc<dyn CacheBackend>>>,
}

impl CacheService {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    /// A service bound to an already constructed backend.
    pub fn with_backend(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            settings: CacheSettings {
                default_ttl,
                ..CacheSettings::default()
            },
            client: OnceCell::new_with(Some(Some(backend))),
        }
    }

    /// A service that never caches.
    pub fn disabled() -> Self {
        Self {
            settings: CacheSettings::default(),
            client: OnceCell::new_with(Some(None)),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.settings.default_ttl
    }

    /// Resolves the backend now instead of on first use. Returns whether a client is available.
    pub async fn warm_up(&self) -> bool {
        self.client().await.is_some()
    }

    /// Whether a backend was resolved successfully. `false` before the first resolution.
    pub fn is_available(&self) -> bool {
        matches!(self.client.get(), Some(Some(_)))
    }

    async fn client(&self) -> Option<Arc<dyn CacheBackend>> {
        self.client
            .get_or_init(|| async {
                match self.connect().await {
                    Ok(b) => {
                        tracing::info!(backend = b.name(), "cache client ready");
                        Some(b)
                    }
                    Err(CacheError::Config(e)) => {
                        tracing::error!(error = %e, "cache disabled");
                        None
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "cache unavailable, continuing without it");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn connect(&self) -> Result<Arc<dyn CacheBackend>, CacheError> {
        let url = self.settings.endpoint()?;
        let timeout = self.settings.connect_timeout;
        let attempt = async {
            let b = backend::connect(&url).await?;
            b.ping().await?;
            Ok::<_, CacheError>(b)
        };
        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| CacheError::Timeout(timeout))?
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let client = self.client().await?;
        match client.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache get failed");
                None
            }
        }
    }

    /// Stored value for `key`, JSON-decoded when possible, else the raw string.
    ///
    /// A string written with [`CacheService::set`] that is itself valid JSON (`"123"`, `"true"`)
    /// reads back decoded. Use [`CacheService::get_json`] when the expected type is known.
    pub async fn get(&self, key: &str) -> Option<JsonValue> {
        let raw = self.get_raw(key).await?;
        Some(serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw)))
    }

    pub async fn get_or(&self, key: &str, default: JsonValue) -> JsonValue {
        self.get(key).await.unwrap_or(default)
    }

    /// Typed read; a value that does not deserialize into `T` counts as a miss.
    ///
    /// Scalar-looking text that does not decode into `T` is retried as a plain string, so strings
    /// stored raw by [`CacheService::set`] still read back as `String` when they look like numbers.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        let decoded = serde_json::from_str::<T>(&raw).or_else(|e| {
            match serde_json::from_str::<JsonValue>(&raw) {
                Ok(JsonValue::Array(_) | JsonValue::Object(_)) => Err(e),
                _ => serde_json::from_value::<T>(JsonValue::String(raw)),
            }
        });
        match decoded {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "cached value has an unexpected shape");
                None
            }
        }
    }

    /// Strings are stored as-is, everything else as JSON text. Stored strings are therefore
    /// indistinguishable from JSON with the same text; see [`CacheService::get`].
    pub async fn set(&self, key: &str, value: &JsonValue, ttl: Duration) -> bool {
        let encoded = match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.set_raw(key, &encoded, ttl).await
    }

    pub async fn set_default(&self, key: &str, value: &JsonValue) -> bool {
        self.set(key, value, self.settings.default_ttl).await
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, &v, ttl).await,
            Err(e) => {
                tracing::warn!(key, error = %CacheError::from(e), "cache set skipped");
                false
            }
        }
    }

    async fn set_raw(&self, key: &str, encoded: &str, ttl: Duration) -> bool {
        let Some(client) = self.client().await else {
            return false;
        };
        match client.set_ex(key, encoded, ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache set failed");
                false
            }
        }
    }

    /// Whether a key was actually removed.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(client) = self.client().await else {
            return false;
        };
        match client.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache delete failed");
                false
            }
        }
    }
}

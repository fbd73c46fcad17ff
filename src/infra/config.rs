//! Centralized configuration (environment variables + defaults).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CACHE_URL: &str = "redis://127.0.0.1:6379/0";
const DEFAULT_COLLECTIONS: &str =
    "thoughts=Thoughts,passions=Passions,delusions=Delusions,interests=Interests";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("REDIS_URL must be set when APP_ENV=production")]
    MissingCacheUrl,

    #[error("COLLECTIONS entry '{0}' is not of the form slug=Table")]
    InvalidCollection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings consumed by the cache service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub environment: Environment,
    /// `REDIS_URL` exactly as configured; resolution happens in [`CacheSettings::endpoint`].
    pub url: Option<String>,
    pub connect_timeout: Duration,
    pub default_ttl: Duration,
}

impl CacheSettings {
    /// The configured URL, else the local default outside production.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        match (&self.url, self.environment) {
            (Some(url), _) => Ok(url.clone()),
            (None, Environment::Development) => Ok(DEFAULT_CACHE_URL.to_string()),
            (None, Environment::Production) => Err(ConfigError::MissingCacheUrl),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            url: None,
            connect_timeout: Duration::from_millis(2000),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_schema: String,
    pub database_max_connections: u32,
    pub cache: CacheSettings,
    pub collection_cache_ttl: Duration,
    pub schema_cache: bool,
    /// Public collection slug -> table name.
    pub collections: BTreeMap<String, String>,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let environment = match get("APP_ENV").as_deref().map(str::to_ascii_lowercase) {
            Some(env) if env == "production" => Environment::Production,
            _ => Environment::Development,
        };

        let cache = CacheSettings {
            environment,
            url: get("REDIS_URL"),
            connect_timeout: Duration::from_millis(parse_or(
                "CACHE_CONNECT_TIMEOUT_MS",
                get("CACHE_CONNECT_TIMEOUT_MS"),
                2000u64,
            )?),
            default_ttl: Duration::from_secs(parse_or(
                "CACHE_DEFAULT_TTL_SECS",
                get("CACHE_DEFAULT_TTL_SECS"),
                3600u64,
            )?),
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: v.to_string(),
                })
            }
        };

        Ok(Self {
            database_url,
            database_schema: get("DATABASE_SCHEMA").unwrap_or_else(|| "public".to_string()),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                5u32,
            )?
            .max(1),
            cache,
            collection_cache_ttl: Duration::from_secs(parse_or(
                "COLLECTION_CACHE_TTL_SECS",
                get("COLLECTION_CACHE_TTL_SECS"),
                300u64,
            )?),
            schema_cache: parse_bool("SCHEMA_CACHE", get("SCHEMA_CACHE"), true)?,
            collections: parse_collections(
                get("COLLECTIONS").as_deref().unwrap_or(DEFAULT_COLLECTIONS),
            )?,
            bind_addr: parse_or(
                "BIND_ADDR",
                get("BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            )?,
            log_format,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: v }),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid { var, value: v }),
    }
}

/// Parses `slug=Table,slug=Table`. Slugs are lowercased.
pub fn parse_collections(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut out = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (slug, table) = entry
            .split_once('=')
            .map(|(s, t)| (s.trim(), t.trim()))
            .filter(|(s, t)| !s.is_empty() && !t.is_empty())
            .ok_or_else(|| ConfigError::InvalidCollection(entry.to_string()))?;
        out.insert(slug.to_ascii_lowercase(), table.to_string());
    }
    Ok(out)
}

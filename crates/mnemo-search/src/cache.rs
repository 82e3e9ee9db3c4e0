//! Redis-backed search response cache.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_ENABLED`: Set to "false" to disable caching (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `REDIS_CACHE_TTL`: Cache TTL in seconds (default: 300)
//!
//! Keys are `<prefix><user_id>:<hash>` so one user's entries can be dropped
//! after their content changes without touching anyone else's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mnemo_core::{defaults, Error, Result, SearchCache, SearchRequest};

/// Cache key for a search request.
///
/// The query is trimmed but keeps its casing, since the vector branch
/// embeds it as written. Content types are sorted, so equivalent requests
/// share an entry.
pub fn search_cache_key(prefix: &str, request: &SearchRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.query.trim().as_bytes());
    hasher.update(request.limit.to_le_bytes());
    hasher.update(request.vector_weight.to_le_bytes());

    let mut types: Vec<_> = request.content_types.iter().map(|t| t.as_str()).collect();
    types.sort_unstable();
    types.dedup();
    for t in types {
        hasher.update(b"|");
        hasher.update(t.as_bytes());
    }

    let hash = hex::encode(hasher.finalize());
    format!("{}{}:{}", prefix, request.user_id, &hash[..16])
}

fn redis_error(e: redis::RedisError) -> Error {
    Error::Cache(e.to_string())
}

/// Search cache backed by Redis.
#[derive(Clone)]
pub struct RedisSearchCache {
    inner: Arc<RedisSearchCacheInner>,
}

struct RedisSearchCacheInner {
    /// Redis connection manager (None if disabled).
    connection: RwLock<Option<ConnectionManager>>,
    /// Cache TTL in seconds.
    ttl_seconds: u64,
    /// Whether caching is enabled.
    enabled: bool,
    /// Cache key prefix.
    prefix: String,
}

impl RedisSearchCache {
    /// Create a cache from environment configuration.
    ///
    /// Connection failures disable the cache rather than failing startup.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let ttl_seconds: u64 = std::env::var("REDIS_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::SEARCH_CACHE_TTL_SECS);

        let connection = if enabled {
            Self::connect(&redis_url, ttl_seconds).await
        } else {
            info!(
                subsystem = "search",
                component = "cache",
                "Redis search cache disabled via REDIS_ENABLED=false"
            );
            None
        };

        Self {
            inner: Arc::new(RedisSearchCacheInner {
                connection: RwLock::new(connection),
                ttl_seconds,
                enabled,
                prefix: defaults::SEARCH_CACHE_PREFIX.to_string(),
            }),
        }
    }

    async fn connect(redis_url: &str, ttl_seconds: u64) -> Option<ConnectionManager> {
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!(
                        subsystem = "search",
                        component = "cache",
                        ttl_secs = ttl_seconds,
                        "Redis search cache enabled"
                    );
                    Some(conn)
                }
                Err(e) => {
                    warn!(
                        subsystem = "search",
                        component = "cache",
                        error = %e,
                        "Failed to connect to Redis, cache disabled"
                    );
                    None
                }
            },
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "cache",
                    error = %e,
                    "Invalid Redis URL, cache disabled"
                );
                None
            }
        }
    }

    /// Create a disabled cache.
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(RedisSearchCacheInner {
                connection: RwLock::new(None),
                ttl_seconds: defaults::SEARCH_CACHE_TTL_SECS,
                enabled: false,
                prefix: defaults::SEARCH_CACHE_PREFIX.to_string(),
            }),
        }
    }

    /// Check if caching is enabled and connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.enabled && self.inner.connection.read().await.is_some()
    }

    /// Key prefix shared by every entry.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Configured TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.inner.ttl_seconds)
    }
}

#[async_trait]
impl SearchCache for RedisSearchCache {
    async fn get_json(&self, key: &str) -> Result<Option<JsonValue>> {
        let mut conn_guard = self.inner.connection.write().await;
        let Some(conn) = conn_guard.as_mut() else {
            return Ok(None);
        };

        match conn.get::<_, Option<String>>(key).await.map_err(redis_error)? {
            Some(data) => {
                debug!(subsystem = "search", component = "cache", key, "Cache HIT");
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => {
                debug!(subsystem = "search", component = "cache", key, "Cache MISS");
                Ok(None)
            }
        }
    }

    async fn set_json(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()> {
        let mut conn_guard = self.inner.connection.write().await;
        let Some(conn) = conn_guard.as_mut() else {
            return Ok(());
        };

        let serialized = serde_json::to_string(value)?;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, serialized, ttl_secs)
            .await
            .map_err(redis_error)?;
        debug!(
            subsystem = "search",
            component = "cache",
            key,
            ttl_secs,
            "Cache SET"
        );
        Ok(())
    }

    async fn invalidate_user(&self, user_id: Uuid) -> Result<u64> {
        let mut conn_guard = self.inner.connection.write().await;
        let Some(conn) = conn_guard.as_mut() else {
            return Ok(0);
        };

        let pattern = format!("{}{}:*", self.inner.prefix, user_id);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(conn)
            .await
            .map_err(redis_error)?;
        if keys.is_empty() {
            return Ok(0);
        }
        conn.del::<_, ()>(&keys[..]).await.map_err(redis_error)?;
        info!(
            subsystem = "search",
            component = "cache",
            user_id = %user_id,
            removed = keys.len(),
            "Cache entries invalidated"
        );
        Ok(keys.len() as u64)
    }
}

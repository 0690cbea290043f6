// Cache-aside layer
//
// The cache is a performance optimization only. `CacheStore` is the raw port
// over a TTL key-value cache; `CacheAside` wraps it with the read/write policy
// and swallows every cache failure so callers fall through to the database.

pub mod keys;
pub mod redis_cache;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use keys::CacheKey;
pub use redis_cache::RedisCache;

/// Errors reported by a cache backend, distinct from a miss
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache operation timed out")]
    Timeout,
}

/// Raw key-value cache with TTL expiry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` on a miss
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache backend used when no cache is configured: every read misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Typed cache-aside wrapper
///
/// Values are stored as JSON. Reads return `None` on a miss, on a backend
/// error, on a timeout and on an undecodable payload alike. Writes and
/// deletes never fail the caller.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    op_timeout: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// A cache-aside wrapper over `NoopCache`
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache), Duration::from_millis(250))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match tokio::time::timeout(self.op_timeout, self.store.get(key)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Ok(Err(e)) => {
                warn!("Cache read failed for {}, falling back to store: {}", key, e);
                return None;
            }
            Err(_) => {
                warn!("Cache read timed out for {}, falling back to store", key);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("Cache hit for {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.invalidate(key).await;
                None
            }
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };

        match tokio::time::timeout(self.op_timeout, self.store.set(key, bytes, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Cache write failed for {}: {}", key, e),
            Err(_) => warn!("Cache write timed out for {}", key),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        match tokio::time::timeout(self.op_timeout, self.store.delete(key)).await {
            Ok(Ok(())) => debug!("Invalidated cache entry {}", key),
            Ok(Err(e)) => warn!("Cache delete failed for {}: {}", key, e),
            Err(_) => warn!("Cache delete timed out for {}", key),
        }
    }
}

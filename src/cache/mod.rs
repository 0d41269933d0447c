//! Cache port.
//!
//! The cache is an accelerator only. Every caller goes through the fail-open
//! helpers below: a cache error is logged and treated as a miss, never
//! surfaced to the client.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Deletes every key starting with `prefix`. Returns how many were removed.
    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
    async fn connect(&self) -> Result<(), CacheError>;
    async fn teardown(&self);
}

/// Used when no cache backend is configured. Always misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn connect(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn teardown(&self) {}
}

/// Cache keys, kept in one place so writers and invalidators agree.
pub mod keys {
    pub fn quiz_bundle(quiz_id: i64) -> String {
        format!("quiz:{quiz_id}:full")
    }

    /// Trailing colon so `quiz:1` does not also match `quiz:12`.
    pub fn quiz_prefix(quiz_id: i64) -> String {
        format!("quiz:{quiz_id}:")
    }

    pub const QUIZ_LISTS_PREFIX: &str = "quizzes:list";

    pub fn active_quizzes(skip: i64, limit: i64) -> String {
        format!("{QUIZ_LISTS_PREFIX}:active:skip:{skip}:limit:{limit}")
    }
}

/// Reads and decodes a cached JSON value. Errors and undecodable payloads
/// are misses; an undecodable entry is also dropped so the next write replaces it.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                if let Err(e) = cache.delete(key).await {
                    tracing::warn!("Cache delete failed for {}: {}", key, e);
                }
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Cache read failed for {}: {}", key, e);
            None
        }
    }
}

/// Encodes and stores a value. Failures are logged and ignored.
pub async fn set_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl_seconds: u64) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to encode cache entry {}: {}", key, e);
            return;
        }
    };
    if let Err(e) = cache.set(key, &raw, ttl_seconds).await {
        tracing::warn!("Cache write failed for {}: {}", key, e);
    }
}

/// Best-effort prefix invalidation.
pub async fn invalidate(cache: &dyn Cache, prefix: &str) {
    match cache.clear_prefix(prefix).await {
        Ok(n) => tracing::debug!("Invalidated {} cache entries under {}", n, prefix),
        Err(e) => tracing::warn!("Cache invalidation failed for {}: {}", prefix, e),
    }
}

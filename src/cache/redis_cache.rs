use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, cmd};
use tokio::sync::RwLock;

use super::{Cache, CacheError};

const SCAN_BATCH: usize = 200;

/// Redis-backed cache. Until [`Cache::connect`] succeeds every operation
/// reports `Unavailable`, which callers treat as a miss.
#[derive(Clone)]
pub struct RedisCache {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

impl RedisCache {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), manager: Arc::new(RwLock::new(None)) }
    }

    async fn manager(&self) -> Result<ConnectionManager, CacheError> {
        let manager = { self.manager.read().await.clone() };
        manager.ok_or_else(|| CacheError::Unavailable("redis not connected".to_string()))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager().await?;
        let value = cmd("GET").arg(key).query_async::<_, Option<String>>(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.manager().await?;
        cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager().await?;
        cmd("DEL").arg(key).query_async::<_, i64>(&mut conn).await?;
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !batch.is_empty() {
                let n: i64 = cmd("DEL").arg(&batch).query_async(&mut conn).await?;
                removed += n.max(0) as u64;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }

    async fn connect(&self) -> Result<(), CacheError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        tracing::info!("Connected to Redis cache");
        Ok(())
    }

    async fn teardown(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconnected_cache_is_unavailable() {
        let cache = RedisCache::new("redis://127.0.0.1:6379");
        assert!(matches!(cache.get("quiz:1:full").await, Err(CacheError::Unavailable(_))));
        assert!(cache.clear_prefix("quiz:1:").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn clear_prefix_removes_matching_keys_only() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let cache = RedisCache::new(url);
        cache.connect().await.expect("redis connect");

        cache.set("quiz:900:full", "a", 60).await.unwrap();
        cache.set("quiz:9000:full", "b", 60).await.unwrap();
        assert_eq!(cache.clear_prefix("quiz:900:").await.unwrap(), 1);
        assert_eq!(cache.get("quiz:900:full").await.unwrap(), None);
        assert_eq!(cache.get("quiz:9000:full").await.unwrap().as_deref(), Some("b"));

        cache.delete("quiz:9000:full").await.unwrap();
        cache.teardown().await;
    }
}

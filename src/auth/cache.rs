//! Volatile Cache
//! Mission: One cache seam for revocation and session state, Redis or memory

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Key-value cache with per-entry TTL.
///
/// The revocation guard and session store only need put/get/delete with
/// expiry, so that is the whole seam. Production uses Redis; tests and
/// cache-less deployments use the in-memory backend.
#[async_trait]
pub trait VolatileCache: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-process fallback backend.
///
/// Entries expire lazily on read and are swept on insert once the map
/// grows past the cap, so an idle instance never balloons.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    max_entries: usize,
}

const MEMORY_CACHE_MAX_ENTRIES: usize = 100_000;

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: MEMORY_CACHE_MAX_ENTRIES,
        }
    }

    #[cfg(test)]
    fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VolatileCache for MemoryCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries {
            let now = Instant::now();
            entries.retain(|_, (_, expires)| *expires > now);
        }
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Redis-backed cache using a shared connection manager.
pub struct RedisCache {
    manager: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl VolatileCache for RedisCache {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .context("Redis SETEX failed")?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await.context("Redis GET failed")?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await.context("Redis DEL failed")?;
        Ok(())
    }
}

/// Advisory session snapshot written on login, cleared on logout.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub login_time: String,
    pub ip: Option<String>,
}

/// Session store over the volatile cache.
///
/// Sessions are advisory: tokens remain the source of truth for auth, so
/// every operation here is best-effort and never fails a request.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn VolatileCache>,
    timeout: Duration,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn VolatileCache>, timeout: Duration, ttl: Duration) -> Self {
        Self { cache, timeout, ttl }
    }

    fn key(user_id: &str) -> String {
        format!("user_session:{user_id}")
    }

    pub async fn write(&self, snapshot: &SessionSnapshot) {
        let key = Self::key(&snapshot.user_id);
        let payload = match serde_json::to_string(snapshot) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session snapshot");
                return;
            }
        };

        let write = self.cache.put(&key, &payload, self.ttl);
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(())) => debug!(user_id = %snapshot.user_id, "Session snapshot written"),
            Ok(Err(e)) => warn!(error = %e, "Session write failed"),
            Err(_) => warn!("Session write timed out"),
        }
    }

    pub async fn clear(&self, user_id: &str) {
        let key = Self::key(user_id);
        let delete = self.cache.delete(&key);
        match tokio::time::timeout(self.timeout, delete).await {
            Ok(Ok(())) => debug!(user_id, "Session snapshot cleared"),
            Ok(Err(e)) => warn!(error = %e, "Session clear failed"),
            Err(_) => warn!("Session clear timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache
            .put("k1", "v1", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(cache.get("missing").await.unwrap(), None);

        cache.delete("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_entries_expire() {
        let cache = MemoryCache::new();
        cache
            .put("short", "v", Duration::from_millis(30))
            .await
            .unwrap();

        assert!(cache.get("short").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_at_capacity() {
        let cache = MemoryCache::with_capacity_limit(2);
        cache
            .put("a", "1", Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .put("b", "2", Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        // At capacity with both entries expired; insert sweeps them out.
        cache.put("c", "3", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.entries.lock().len(), 1);
        assert_eq!(cache.get("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_session_store_write_and_clear() {
        let cache = Arc::new(MemoryCache::new());
        let sessions = SessionStore::new(
            cache.clone(),
            Duration::from_millis(200),
            Duration::from_secs(60),
        );

        let snapshot = SessionSnapshot {
            user_id: "user-1".to_string(),
            email: "alice@example.com".to_string(),
            role: "viewer".to_string(),
            login_time: "2026-01-01T00:00:00Z".to_string(),
            ip: Some("127.0.0.1".to_string()),
        };

        sessions.write(&snapshot).await;
        let stored = cache.get("user_session:user-1").await.unwrap().unwrap();
        assert!(stored.contains("alice@example.com"));

        sessions.clear("user-1").await;
        assert_eq!(cache.get("user_session:user-1").await.unwrap(), None);
    }
}

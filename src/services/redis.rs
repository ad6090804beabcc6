//! Short-lived JSON cache
//!
//! Backed by Redis when `redis.enabled` is set, otherwise by an in-process
//! map with the same TTL semantics. Used for admin-status lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};
use crate::config::settings::RedisConfig;
use crate::utils::errors::Result;

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Memory(Arc<Mutex<HashMap<String, (String, Instant)>>>),
}

#[derive(Clone)]
pub struct CacheService {
    backend: Backend,
    prefix: String,
    default_ttl: Duration,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend_name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CacheService {
    /// Connect to Redis when enabled; fall back to memory if Redis is unreachable
    pub async fn new(config: &RedisConfig) -> Self {
        let default_ttl = Duration::from_secs(config.ttl_seconds);
        if config.enabled {
            match Self::connect(&config.url).await {
                Ok(manager) => {
                    info!(url = %config.url, "Connected to Redis cache");
                    return Self {
                        backend: Backend::Redis(manager),
                        prefix: config.prefix.clone(),
                        default_ttl,
                    };
                }
                Err(e) => warn!(error = %e, "Redis unavailable, using in-memory cache"),
            }
        }
        Self::in_memory(&config.prefix, default_ttl)
    }

    pub fn in_memory(prefix: &str, default_ttl: Duration) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
            prefix: prefix.to_string(),
            default_ttl,
        }
    }

    async fn connect(url: &str) -> RedisResult<ConnectionManager> {
        let client = Client::open(url)?;
        ConnectionManager::new(client).await
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let full_key = self.full_key(key);
        let ttl = ttl.unwrap_or(self.default_ttl);

        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = conn.set_ex(&full_key, serialized, ttl.as_secs().max(1)).await?;
            }
            Backend::Memory(map) => {
                if let Ok(mut map) = map.lock() {
                    map.insert(full_key.clone(), (serialized, Instant::now() + ttl));
                }
            }
        }

        debug!(key = %full_key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let full_key = self.full_key(key);
        let raw: Option<String> = match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.get(&full_key).await?
            }
            Backend::Memory(map) => match map.lock() {
                Ok(mut map) => match map.get(&full_key) {
                    Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
                    Some(_) => {
                        map.remove(&full_key);
                        None
                    }
                    None => None,
                },
                Err(_) => None,
            },
        };

        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full_key = self.full_key(key);
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let deleted: i64 = conn.del(&full_key).await?;
                Ok(deleted > 0)
            }
            Backend::Memory(map) => Ok(map
                .lock()
                .map(|mut map| map.remove(&full_key).is_some())
                .unwrap_or(false)),
        }
    }

    pub async fn health_check(&self) -> bool {
        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match pong {
                    Ok(response) => response == "PONG",
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        false
                    }
                }
            }
            Backend::Memory(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_roundtrip_and_delete() {
        let cache = CacheService::in_memory("test:", Duration::from_secs(60));
        cache.set("admin:a@b.co", &true, None).await.unwrap();
        assert_eq!(cache.get::<bool>("admin:a@b.co").await.unwrap(), Some(true));
        assert!(cache.delete("admin:a@b.co").await.unwrap());
        assert_eq!(cache.get::<bool>("admin:a@b.co").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_expires() {
        let cache = CacheService::in_memory("test:", Duration::from_secs(60));
        cache.set("k", &"v", Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disabled_redis_uses_memory() {
        let config = RedisConfig {
            enabled: false,
            url: "redis://localhost:6379".to_string(),
            prefix: "hearts:".to_string(),
            ttl_seconds: 300,
        };
        let cache = CacheService::new(&config).await;
        assert_eq!(cache.backend_name(), "memory");
        assert!(cache.health_check().await);
    }
}

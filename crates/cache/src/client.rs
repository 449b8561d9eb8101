//! Redis-backed two-tier cache: `LocalCache` (L1) in front of Redis (L2).
//! Used throughout the backend for dedup (webhook signature replay, inbound
//! external_id, journey trigger debounce) and as the backing store for
//! `AdvisoryLock`.

use crate::local::LocalCache;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use wireline_core::config::RedisConfig;

pub struct RedisCache {
    client: redis::Client,
    local: Arc<LocalCache<serde_json::Value>>,
    ttl_secs: u64,
}

impl RedisCache {
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str())?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        let local = Arc::new(LocalCache::new(30, 1_000_000));

        Ok(Self {
                client,
                local,
                ttl_secs: config.default_ttl_secs,
            })
    }

    async fn connection(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Fetch a value, checking L1 before falling through to Redis.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        if let Some(value) = self.local.get(key) {
            metrics::counter!("cache.l1.hit").increment(1);
            return Ok(Some(serde_json::from_value((*value).clone())?));
        }
        metrics::counter!("cache.l1.miss").increment(1);

        let mut conn = self.connection().await?;
        let data: Option<String> = conn.get(key).await?;
        match data {
            Some(json) => {
                let value: serde_json::Value = serde_json::from_str(&json)?;
                self.local.put(key.to_string(), value.clone());
                metrics::counter!("cache.l2.hit").increment(1);
                Ok(Some(serde_json::from_value(value)?))
            }
            None => {
                metrics::counter!("cache.l2.miss").increment(1);
                debug!(key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Store a value in both tiers with a TTL (seconds).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> anyhow::Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, &json, ttl_secs.max(1)).await?;
        self.local.put(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Set `key` only if absent, with a TTL. Returns `true` if this call
    /// created the key (first-seen), `false` if it already existed — the
    /// building block for webhook-signature replay detection and inbound
    /// trigger debounce.
    pub async fn set_nx(&self, key: &str, value: &str, ttl_ms: u64) -> anyhow::Result<bool> {
        let mut conn = self.connection().await?;
        let created: bool = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("NX")
        .arg("PX")
        .arg(ttl_ms.max(1))
        .query_async::<_, Option<String>>(&mut conn)
        .await?
        .is_some();
        Ok(created)
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// Delete `key` only if its current value matches `expected` — used by
    /// `AdvisoryLock::release` to avoid releasing a lock someone else holds.
    pub async fn delete_if_eq(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
        const SCRIPT: &str = r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
        else
        return 0
        end
        "#;
        let mut conn = self.connection().await?;
        let deleted: i64 = redis::Script::new(SCRIPT)
        .key(key)
        .arg(expected)
        .invoke_async(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub async fn maintenance(&self) {
        let evicted = self.local.evict_expired();
        if evicted > 0 {
            debug!(evicted, "Local cache eviction complete");
        }
    }

    pub fn local_cache_size(&self) -> usize {
        self.local.len()
    }
}

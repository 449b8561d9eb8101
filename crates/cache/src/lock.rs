//! Redis-backed advisory lock (`SET NX PX` / compare-and-delete release),
//! the single-writer primitive required of the campaign
//! scheduler tick, the journey sweep, and the job substrate's per-queue
//! dispatch loop.

use crate::client::RedisCache;
use std::sync::Arc;
use uuid::Uuid;

pub struct AdvisoryLock {
    cache: Arc<RedisCache>,
    key: String,
    token: String,
}

impl AdvisoryLock {
    /// Attempts to acquire `key` for `ttl_ms`. Returns `None` if another
    /// holder already owns it.
    pub async fn try_acquire(
        cache: Arc<RedisCache>,
        key: impl Into<String>,
        ttl_ms: u64,
    ) -> anyhow::Result<Option<Self>> {
        let key = key.into();
        let token = Uuid::new_v4().to_string();
        let acquired = cache.set_nx(&key, &token, ttl_ms).await?;
        if acquired {
            Ok(Some(Self { cache, key, token }))
        } else {
            Ok(None)
        }
    }

    /// Releases the lock if it is still held by this token (best-effort —
    /// a lock that expired and was reacquired by someone else is left
    /// alone).
    pub async fn release(self) -> anyhow::Result<()> {
        self.cache.delete_if_eq(&self.key, &self.token).await?;
        Ok(())
    }
}

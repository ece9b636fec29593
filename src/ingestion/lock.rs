//! Per-connector distributed lock (spec §5): `SET NX EX`, non-blocking
//! acquisition, TTL-based recovery from crashed workers.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

/// Holds a lock token while acquired; releasing compares-and-deletes so
/// a worker can never release a lock some other worker has since
/// reacquired after this one's TTL expired.
pub struct LockGuard {
    redis: deadpool_redis::Pool,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub async fn release(mut self) {
        self.release_inner().await;
    }

    async fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let Ok(mut conn) = self.redis.get().await else {
            return;
        };
        // Compare-and-delete via a small Lua script so we never release
        // a lock acquired by a different worker after ours expired.
        let script = redis::Script::new(
            r"if redis.call('get', KEYS[1]) == ARGV[1] then
                return redis.call('del', KEYS[1])
              else
                return 0
              end",
        );
        let _: redis::RedisResult<i64> = script.key(&self.key).arg(&self.token).invoke_async(&mut conn).await;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Best-effort: a dropped-without-release guard still expires via
        // TTL, but we try an immediate release too.
        let redis = self.redis.clone();
        let key = self.key.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            if let Ok(mut conn) = redis.get().await {
                let script = redis::Script::new(
                    r"if redis.call('get', KEYS[1]) == ARGV[1] then
                        return redis.call('del', KEYS[1])
                      else
                        return 0
                      end",
                );
                let _: redis::RedisResult<i64> = script.key(&key).arg(&token).invoke_async(&mut conn).await;
            }
        });
    }
}

pub struct DistributedLock {
    redis: deadpool_redis::Pool,
    ttl: Duration,
}

impl DistributedLock {
    pub fn new(redis: deadpool_redis::Pool, ttl: Duration) -> Self {
        Self { redis, ttl }
    }

    /// Attempts to acquire the named lock. Returns `None` immediately if
    /// it is already held — acquisition never blocks (spec §5).
    pub async fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>, redis::RedisError> {
        let key = format!("lock:{name}");
        let token = Uuid::new_v4().to_string();
        let mut conn = self.redis.get().await.map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "pool error", e.to_string()))
        })?;

        let acquired: bool = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs())
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();

        if !acquired {
            return Ok(None);
        }

        Ok(Some(LockGuard {
            redis: self.redis.clone(),
            key,
            token,
            released: false,
        }))
    }
}

pub type SharedLock = Arc<DistributedLock>;

use crate::entry::{cache_key, decode, encode, time_to_live, DEFAULT_KEY_PREFIX};
use async_trait::async_trait;
use redis::AsyncCommands;
use snip_core::cache::Result;
use snip_core::{CacheError, Clock, ShortCode, SystemClock, UrlCache, UrlRecord};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A Redis-based implementation of [`UrlCache`].
///
/// Records are stored as JSON strings under `"url:" + code` with a
/// millisecond TTL ending at the record's own expiry.
#[derive(Debug, Clone)]
pub struct RedisUrlCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    clock: Arc<dyn Clock>,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        CacheError::Timeout(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisUrlCache {
    /// Creates a new Redis URL cache.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Opens a multiplexed connection to `redis_url` and verifies it with `PING`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Initialization(format!("invalid redis url: {e}")))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(format!("failed to connect to Redis: {e}")))?;
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to ping Redis", e))?;
        Ok(Self::new(conn))
    }

    /// Replaces the key prefix (e.g. "myapp:url:").
    pub fn with_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Replaces the clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Generates the cache key for a short code.
    fn cache_key(&self, code: &ShortCode) -> String {
        cache_key(&self.key_prefix, code)
    }
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let key = self.cache_key(code);
        trace!(code = %code, "Fetching URL record from Redis cache");

        let mut conn = self.conn.clone();
        let cached = match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                trace!(code = %code, "Cache miss in Redis");
                return Ok(None);
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Redis error on get");
                return Err(map_redis_error("failed to fetch value from Redis", e));
            }
        };

        let record = decode(&key, &cached).inspect_err(|e| {
            warn!(code = %code, error = %e, "Failed to deserialize cached record");
        })?;

        if !record.is_live(self.clock.now()) {
            debug!(
                code = %code,
                expires_at = %record.expires_at,
                "Cached record expired, evicting"
            );
            if let Err(e) = conn.del::<_, ()>(&key).await {
                warn!(code = %code, error = %e, "Failed to evict expired record from Redis");
            }
            return Ok(None);
        }

        debug!(code = %code, "Cache hit in Redis");
        Ok(Some(record))
    }

    async fn set_url(&self, record: &UrlRecord) -> Result<()> {
        let code = &record.short_code;
        let Some(ttl) = time_to_live(record.expires_at, self.clock.now()) else {
            debug!(code = %code, "Record already expired, not caching");
            return Ok(());
        };

        let key = self.cache_key(code);
        trace!(code = %code, ttl_ms = ttl.as_millis() as u64, "Storing URL record in Redis cache");

        let json = encode(record).inspect_err(|e| {
            warn!(code = %code, error = %e, "Failed to serialize record for caching");
        })?;

        let mut conn = self.conn.clone();
        match conn
            .pset_ex::<_, _, ()>(&key, json, ttl.as_millis() as u64)
            .await
        {
            Ok(()) => {
                debug!(code = %code, "Cached record in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to cache record in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        let key = self.cache_key(code);
        trace!(code = %code, "Removing URL record from Redis cache");

        let mut conn = self.conn.clone();
        match conn.del::<_, ()>(&key).await {
            Ok(()) => {
                debug!(code = %code, "Removed record from Redis cache");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to remove record from Redis cache");
                Err(map_redis_error("failed to delete value from Redis", e))
            }
        }
    }
}

// Tests that need a running Redis live in tests/redis_cache_integration.rs.

use crate::entry::time_to_live;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use snip_core::cache::Result;
use snip_core::{Clock, ShortCode, SystemClock, UrlCache, UrlRecord};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    record: UrlRecord,
    ttl: Duration,
}

/// Expires each entry at its own record's expiry, fixed at write time.
struct RecordExpiry;

impl Expiry<String, Entry> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// An in-memory cache implementation using Moka.
///
/// Suited to single-node deployments. Each entry carries a per-entry TTL
/// ending at the record's `expires_at`; reads additionally check the record
/// against the injected clock and evict it when it is no longer live.
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    cache: Cache<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MokaUrlCache {
    /// Creates a new Moka URL cache with a maximum capacity of 10,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Creates a new Moka URL cache with a custom maximum capacity.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries the cache can hold
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(RecordExpiry)
            .build();
        Self {
            cache,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        trace!(code = %code, "Fetching URL record from Moka cache");

        let key = code.as_str().to_string();
        let Some(entry) = self.cache.get(&key).await else {
            trace!(code = %code, "Cache miss in Moka");
            return Ok(None);
        };

        if !entry.record.is_live(self.clock.now()) {
            debug!(
                code = %code,
                expires_at = %entry.record.expires_at,
                "Cached record expired, evicting"
            );
            self.cache.invalidate(&key).await;
            return Ok(None);
        }

        debug!(code = %code, "Cache hit in Moka");
        Ok(Some(entry.record))
    }

    async fn set_url(&self, record: &UrlRecord) -> Result<()> {
        let code = &record.short_code;
        let Some(ttl) = time_to_live(record.expires_at, self.clock.now()) else {
            debug!(code = %code, "Record already expired, not caching");
            return Ok(());
        };

        trace!(code = %code, ttl_ms = ttl.as_millis() as u64, "Storing URL record in Moka cache");
        let entry = Entry {
            record: record.clone(),
            ttl,
        };
        self.cache.insert(code.as_str().to_string(), entry).await;
        debug!(code = %code, "Cached record in Moka");
        Ok(())
    }

    async fn del(&self, code: &ShortCode) -> Result<()> {
        trace!(code = %code, "Removing URL record from Moka cache");

        self.cache.invalidate(code.as_str()).await;
        debug!(code = %code, "Removed record from Moka cache (if present)");
        Ok(())
    }
}

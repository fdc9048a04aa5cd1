use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use parking_lot::Mutex;
use snip_core::repository::{NewUrlRecord, Repository, Result, UrlRecord};
use snip_core::{Clock, ShortCode, StorageError, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// In-memory implementation of the Repository trait using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking. Inserts go through the entry API, so two
/// concurrent inserts of the same code cannot both succeed.
///
/// The code with the highest id is tracked on insert, so
/// `latest_created` is a single lookup unless that record was purged.
#[derive(Debug)]
pub struct InMemoryRepository {
    storage: DashMap<ShortCode, UrlRecord>,
    next_id: AtomicU64,
    latest: Mutex<Option<(u64, ShortCode)>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
            next_id: AtomicU64::new(0),
            latest: Mutex::new(None),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to stamp `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn is_code_available(&self, code: &ShortCode) -> Result<bool> {
        Ok(!self.storage.contains_key(code))
    }

    async fn insert(&self, record: NewUrlRecord) -> Result<()> {
        match self.storage.entry(record.short_code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(record.short_code.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                trace!(code = %record.short_code, id, "Inserted record into memory");
                {
                    let mut latest = self.latest.lock();
                    if latest.as_ref().is_none_or(|(latest_id, _)| *latest_id < id) {
                        *latest = Some((id, record.short_code.clone()));
                    }
                }
                slot.insert(UrlRecord {
                    id,
                    short_code: record.short_code,
                    original_url: record.original_url,
                    is_custom: record.is_custom,
                    expires_at: record.expires_at,
                    created_at: self.clock.now(),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.storage.get(code).map(|entry| entry.value().clone()))
    }

    async fn latest_created(&self) -> Result<Option<UrlRecord>> {
        let tracked = self.latest.lock().clone();
        if let Some((id, code)) = tracked {
            if let Some(entry) = self.storage.get(&code) {
                if entry.value().id == id {
                    return Ok(Some(entry.value().clone()));
                }
            }
        }

        // The newest record was purged; fall back to a scan.
        Ok(self
            .storage
            .iter()
            .max_by_key(|entry| entry.value().id)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64> {
        let mut removed = 0u64;
        self.storage.retain(|_, record| {
            let keep = record.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use snip_core::{
    Clock, ExpirationPolicy, NewUrlRecord, Repository, ShortCode, ShortenParams, Shortener,
    ShortenerError, StorageError, SystemClock, UrlCache, UrlRecord,
};
use snip_generator::Generator;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Total number of random candidates tried before giving up.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Tunables for [`ShortenerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortenerConfig {
    /// Lifetime of a record created without an explicit duration.
    pub default_expiration: SignedDuration,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            default_expiration: SignedDuration::from_hours(24),
        }
    }
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Outcome of a single allocation attempt.
enum Attempt {
    Inserted(ShortCode),
    Collision(ShortCode),
}

/// The allocation and resolution engine.
///
/// This service wraps a `Repository`, a `UrlCache` and a `Generator` to
/// handle:
/// - random allocation with a bounded collision-retry loop
/// - custom codes, with the store's uniqueness constraint as the authority
/// - cache-aside resolution that never serves an expired record
/// - bulk purge of expired records
///
/// Every operation races against the service's cancellation token and
/// fails with [`ShortenerError::Cancelled`] once it fires.
#[derive(TypedBuilder)]
pub struct ShortenerService<R, C, G> {
    repository: Arc<R>,
    cache: Arc<C>,
    generator: Arc<G>,
    #[builder(default = system_clock())]
    clock: Arc<dyn Clock>,
    #[builder(default)]
    config: ShortenerConfig,
    #[builder(default)]
    cancel: CancellationToken,
}

impl<R, C, G> Clone for ShortenerService<R, C, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            generator: Arc::clone(&self.generator),
            clock: Arc::clone(&self.clock),
            config: self.config,
            cancel: self.cancel.clone(),
        }
    }
}

impl<R, C, G> std::fmt::Debug for ShortenerService<R, C, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerService")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<R: Repository, C: UrlCache, G: Generator> ShortenerService<R, C, G> {
    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    /// The token whose cancellation aborts every in-flight operation.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn until_cancelled<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ShortenerError::Cancelled),
            result = operation => result,
        }
    }

    fn expires_at(&self, now: Timestamp, policy: ExpirationPolicy) -> Result<Timestamp> {
        let lifetime = match policy {
            ExpirationPolicy::Default => self.config.default_expiration,
            ExpirationPolicy::AfterHours(hours) => SignedDuration::from_hours(i64::from(hours)),
        };
        now.checked_add(lifetime).map_err(|e| {
            ShortenerError::InvalidExpiration(format!("{lifetime:?} from {now} overflows: {e}"))
        })
    }

    async fn create(&self, params: ShortenParams) -> Result<UrlRecord> {
        let ShortenParams {
            original_url,
            custom_code,
            expiration,
        } = params;
        let expires_at = self.expires_at(self.clock.now(), expiration)?;

        let code = match custom_code {
            Some(code) => self.insert_custom(code, &original_url, expires_at).await?,
            None => self.allocate(&original_url, expires_at).await?,
        };

        let record = self.fetch_created(&code).await?;
        self.cache.set_url(&record).await.inspect_err(|e| {
            warn!(code = %code, error = %e, "Failed to cache new record; it remains stored");
        })?;

        info!(
            code = %record.short_code,
            is_custom = record.is_custom,
            expires_at = %record.expires_at,
            "Created short URL"
        );
        Ok(record)
    }

    async fn insert_custom(
        &self,
        code: ShortCode,
        original_url: &str,
        expires_at: Timestamp,
    ) -> Result<ShortCode> {
        // Early exit only; the insert below is what actually enforces uniqueness.
        if !self.repository.is_code_available(&code).await? {
            debug!(code = %code, "Custom code already taken");
            return Err(ShortenerError::CodeUnavailable(code.to_string()));
        }

        let record = NewUrlRecord {
            short_code: code.clone(),
            original_url: original_url.to_string(),
            expires_at,
            is_custom: true,
        };
        match self.repository.insert(record).await {
            Ok(()) => Ok(code),
            Err(StorageError::Conflict(_)) => {
                debug!(code = %code, "Custom code taken by a concurrent insert");
                Err(ShortenerError::CodeUnavailable(code.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn allocate(&self, original_url: &str, expires_at: Timestamp) -> Result<ShortCode> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            if self.cancel.is_cancelled() {
                return Err(ShortenerError::Cancelled);
            }

            let candidate: ShortCode = self.generator.generate().into();
            match self.try_candidate(candidate, original_url, expires_at).await? {
                Attempt::Inserted(code) => {
                    trace!(code = %code, attempt, "Allocated short code");
                    return Ok(code);
                }
                Attempt::Collision(code) => {
                    debug!(code = %code, attempt, "Short code collision");
                }
            }
        }

        warn!(
            attempts = MAX_ALLOCATION_ATTEMPTS,
            "Every candidate short code collided"
        );
        Err(ShortenerError::AllocationExhausted {
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
    }

    async fn try_candidate(
        &self,
        candidate: ShortCode,
        original_url: &str,
        expires_at: Timestamp,
    ) -> Result<Attempt> {
        if !self.repository.is_code_available(&candidate).await? {
            return Ok(Attempt::Collision(candidate));
        }

        let record = NewUrlRecord {
            short_code: candidate.clone(),
            original_url: original_url.to_string(),
            expires_at,
            is_custom: false,
        };
        match self.repository.insert(record).await {
            Ok(()) => Ok(Attempt::Inserted(candidate)),
            Err(StorageError::Conflict(_)) => Ok(Attempt::Collision(candidate)),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads back the row just inserted under `code` to pick up store-assigned fields.
    async fn fetch_created(&self, code: &ShortCode) -> Result<UrlRecord> {
        if let Some(latest) = self.repository.latest_created().await? {
            if latest.short_code == *code {
                return Ok(latest);
            }
        }

        trace!(code = %code, "Latest row belongs to another insert, fetching by code");
        self.repository.get(code).await?.ok_or_else(|| {
            StorageError::InvalidData(format!("record '{code}' missing right after insert")).into()
        })
    }

    async fn lookup(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let now = self.clock.now();

        match self.cache.get_url(code).await {
            Ok(Some(record)) if record.is_live(now) => {
                trace!(code = %code, "Resolved from cache");
                return Ok(Some(record));
            }
            Ok(_) => trace!(code = %code, "Cache miss"),
            Err(e) => warn!(code = %code, error = %e, "Cache lookup failed, reading store"),
        }

        let Some(record) = self.repository.get(code).await? else {
            debug!(code = %code, "Short code not found");
            return Ok(None);
        };

        if !record.is_live(now) {
            debug!(code = %code, expires_at = %record.expires_at, "Short code expired");
            return Ok(None);
        }

        if let Err(e) = self.cache.set_url(&record).await {
            warn!(code = %code, error = %e, "Failed to repopulate cache");
        }
        Ok(Some(record))
    }

    async fn purge(&self) -> Result<u64> {
        let removed = self.repository.delete_expired(self.clock.now()).await?;
        debug!(removed, "Purged expired records");
        Ok(removed)
    }
}

#[async_trait]
impl<R: Repository, C: UrlCache, G: Generator> Shortener for ShortenerService<R, C, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord> {
        self.until_cancelled(self.create(params)).await
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        self.until_cancelled(self.lookup(code)).await
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        self.until_cancelled(self.purge()).await
    }
}

use crate::error::CacheError;
use crate::repository::UrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A volatile, TTL-bounded cache for URL records.
///
/// The cache is a derived view of the repository keyed by [`ShortCode`].
/// Every entry expires at its record's `expires_at`, and a record that is
/// already expired is never returned.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get URL record from cache.
    ///
    /// Returns `Ok(None)` if the key is absent or the cached record has
    /// expired; in the latter case the entry is also evicted.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Store URL record in cache until its expiry.
    ///
    /// Storing a record whose expiry has already passed is a no-op.
    async fn set_url(&self, record: &UrlRecord) -> Result<()>;

    /// Remove URL record from cache.
    ///
    /// It is not an error if the key does not exist.
    async fn del(&self, code: &ShortCode) -> Result<()>;
}

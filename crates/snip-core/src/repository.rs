use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A mapping that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrlRecord {
    pub short_code: ShortCode,
    pub original_url: String,
    pub expires_at: Timestamp,
    pub is_custom: bool,
}

/// A stored code to URL mapping.
///
/// `id` and `created_at` are assigned by the durable store on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub id: u64,
    pub short_code: ShortCode,
    /// The redirect target.
    pub original_url: String,
    /// Whether the code was supplied by the user rather than generated.
    pub is_custom: bool,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

impl UrlRecord {
    /// A record is live while `now` is strictly before its expiry.
    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// The authoritative store of code to URL mappings.
///
/// Implementations must make [`Repository::insert`] the uniqueness authority:
/// two inserts with the same code can never both succeed.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Returns `true` if no record, live or expired-but-unpurged, holds `code`.
    async fn is_code_available(&self, code: &ShortCode) -> Result<bool>;

    /// Inserts a new record. Returns `Err(StorageError::Conflict)` if the code is taken.
    async fn insert(&self, record: NewUrlRecord) -> Result<()>;

    /// Exact-match lookup. Expired records are returned until they are purged.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Returns the most recently inserted record, if any.
    async fn latest_created(&self) -> Result<Option<UrlRecord>>;

    /// Deletes every record with `expires_at <= now` and returns how many were removed.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64>;
}

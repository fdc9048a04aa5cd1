//! Wire format and expiry arithmetic shared by the cache adapters.

use jiff::Timestamp;
use snip_core::{CacheError, ShortCode, UrlRecord};
use std::time::Duration;

/// Key prefix for cached records.
pub const DEFAULT_KEY_PREFIX: &str = "url:";

/// Builds the cache key for a short code.
pub(crate) fn cache_key(prefix: &str, code: &ShortCode) -> String {
    format!("{}{}", prefix, code.as_str())
}

pub(crate) fn encode(record: &UrlRecord) -> Result<String, CacheError> {
    serde_json::to_string(record)
        .map_err(|e| CacheError::Serialization(format!("failed to serialize cache value: {e}")))
}

pub(crate) fn decode(key: &str, payload: &str) -> Result<UrlRecord, CacheError> {
    serde_json::from_str(payload)
        .map_err(|e| CacheError::InvalidData(format!("invalid cached value for key '{key}': {e}")))
}

/// Time left until `expires_at`, or `None` if the record is already dead.
///
/// Anything below one millisecond is rounded up so that a live record is
/// never written with a zero TTL.
pub(crate) fn time_to_live(expires_at: Timestamp, now: Timestamp) -> Option<Duration> {
    if now >= expires_at {
        return None;
    }
    let remaining = Duration::try_from(expires_at.duration_since(now)).ok()?;
    Some(remaining.max(Duration::from_millis(1)))
}

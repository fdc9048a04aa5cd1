//! Volatile cache adapters for URL records.
//!
//! Both adapters implement [`snip_core::UrlCache`] and honor the same
//! contract: entries expire with their record, expired records are never
//! returned, and caching an already expired record does nothing.

mod entry;
pub mod moka;
pub mod redis;

pub use entry::DEFAULT_KEY_PREFIX;
pub use crate::moka::MokaUrlCache;
pub use crate::redis::RedisUrlCache;

//! Core types and traits for the Snip URL shortener.
//!
//! This crate provides the domain types and the seams (cache, repository,
//! shortener, clock) shared by the storage backends, cache adapters,
//! the engine and the HTTP gateway.

pub mod cache;
pub mod clock;
pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use cache::UrlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, CoreError, ShortenerError, StorageError};
pub use repository::{NewUrlRecord, Repository, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{ExpirationPolicy, ShortenParams, Shortener};

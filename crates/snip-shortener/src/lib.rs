//! Allocation and resolution engine for short codes.
//!
//! [`ShortenerService`] ties a durable [`Repository`](snip_core::Repository),
//! a volatile [`UrlCache`](snip_core::UrlCache) and a code
//! [`Generator`](snip_generator::Generator) together. [`spawn_sweeper`]
//! purges expired records on a fixed interval.

pub mod service;
pub mod sweeper;

pub use service::{ShortenerConfig, ShortenerService, MAX_ALLOCATION_ATTEMPTS};
pub use sweeper::{spawn_sweeper, SweeperConfig};

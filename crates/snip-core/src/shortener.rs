use crate::repository::UrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Expiration policy for a shortened URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Expire after the service's configured default expiration.
    #[default]
    Default,
    /// Expire the given number of hours from now. Zero expires immediately.
    AfterHours(u32),
}

impl From<Option<u32>> for ExpirationPolicy {
    fn from(hours: Option<u32>) -> Self {
        hours.map_or(Self::Default, Self::AfterHours)
    }
}

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone)]
pub struct ShortenParams {
    /// The original URL to be shortened.
    pub original_url: String,
    /// Optional user-supplied code. `None` requests a generated one.
    pub custom_code: Option<ShortCode>,
    /// The expiration policy for the shortened URL.
    pub expiration: ExpirationPolicy,
}

impl ShortenParams {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            custom_code: None,
            expiration: ExpirationPolicy::Default,
        }
    }

    pub fn with_custom_code(mut self, code: ShortCode) -> Self {
        self.custom_code = Some(code);
        self
    }

    pub fn with_expiration(mut self, expiration: impl Into<ExpirationPolicy>) -> Self {
        self.expiration = expiration.into();
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a mapping and returns the stored record.
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord>;

    /// Resolves a short code to its live record.
    /// Returns `None` if the code does not exist or has expired.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Purges every expired record from the durable store.
    /// Returns the number of records removed.
    async fn cleanup_expired(&self) -> Result<u64>;
}

use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use redis::AsyncCommands;
use snip_cache::RedisUrlCache;
use snip_core::{Clock, ManualClock, ShortCode, UrlCache, UrlRecord};
use snip_test_infra::RedisServer;

/// Test fixture that manages a Redis container using test-infra.
struct RedisFixture {
    server: RedisServer,
}

impl RedisFixture {
    async fn start() -> Self {
        let server = RedisServer::new().await.expect("Failed to start Redis");
        Self { server }
    }

    async fn connection(&self) -> redis::aio::MultiplexedConnection {
        self.server
            .connection()
            .await
            .expect("Failed to get Redis connection")
    }

    async fn cache(&self) -> RedisUrlCache {
        RedisUrlCache::new(self.connection().await)
    }
}

fn record(code: &str, url: &str, expires_at: Timestamp) -> UrlRecord {
    UrlRecord {
        id: 7,
        short_code: ShortCode::new_unchecked(code),
        original_url: url.to_string(),
        is_custom: false,
        expires_at,
        created_at: Timestamp::now(),
    }
}

#[tokio::test]
async fn redis_cache_get_set_del() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await;
    let code = ShortCode::new("test123").unwrap();
    let rec = record(
        "test123",
        "https://example.com",
        Timestamp::now() + SignedDuration::from_hours(1),
    );

    assert!(cache.get_url(&code).await.unwrap().is_none());

    cache.set_url(&rec).await.unwrap();
    assert_eq!(cache.get_url(&code).await.unwrap(), Some(rec));

    cache.del(&code).await.unwrap();
    assert!(cache.get_url(&code).await.unwrap().is_none());

    // Deleting a missing key is not an error.
    cache.del(&code).await.unwrap();
}

#[tokio::test]
async fn redis_cache_stores_json_under_prefixed_key_with_ttl() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await;
    let mut conn = fixture.connection().await;
    let rec = record(
        "ttl1234",
        "https://example.com/ttl",
        Timestamp::now() + SignedDuration::from_mins(10),
    );

    cache.set_url(&rec).await.unwrap();

    let raw: String = conn.get("url:ttl1234").await.unwrap();
    let stored: UrlRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored, rec);

    let ttl_ms: i64 = conn.pttl("url:ttl1234").await.unwrap();
    assert!(ttl_ms > 0 && ttl_ms <= 10 * 60 * 1000, "unexpected ttl {ttl_ms}");
}

#[tokio::test]
async fn redis_cache_skips_expired_records() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await;
    let mut conn = fixture.connection().await;
    let rec = record(
        "dead123",
        "https://example.com",
        Timestamp::now() - SignedDuration::from_secs(1),
    );

    cache.set_url(&rec).await.unwrap();

    let exists: bool = conn.exists("url:dead123").await.unwrap();
    assert!(!exists);
}

#[tokio::test]
async fn redis_cache_evicts_record_past_expiry_on_read() {
    let fixture = RedisFixture::start().await;
    let clock = ManualClock::new(Timestamp::now());
    let cache = fixture.cache().await.with_clock(Arc::new(clock.clone()));
    let mut conn = fixture.connection().await;
    let code = ShortCode::new("lazy123").unwrap();
    let rec = record(
        "lazy123",
        "https://example.com",
        clock.now() + SignedDuration::from_hours(1),
    );

    cache.set_url(&rec).await.unwrap();
    assert!(cache.get_url(&code).await.unwrap().is_some());

    clock.advance(SignedDuration::from_hours(2));

    assert!(cache.get_url(&code).await.unwrap().is_none());
    let exists: bool = conn.exists("url:lazy123").await.unwrap();
    assert!(!exists, "expired entry should be deleted on read");
}

#[tokio::test]
async fn redis_entry_expires_with_record() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await;
    let code = ShortCode::new("short1").unwrap();
    let rec = record(
        "short1",
        "https://example.com",
        Timestamp::now() + SignedDuration::from_millis(300),
    );

    cache.set_url(&rec).await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(cache.get_url(&code).await.unwrap().is_none());
}

#[tokio::test]
async fn redis_cache_rejects_corrupt_payload() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await;
    let mut conn = fixture.connection().await;

    let _: () = conn.set("url:broken", "not json").await.unwrap();

    let err = cache
        .get_url(&ShortCode::new("broken").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, snip_core::CacheError::InvalidData(_)));
}

#[tokio::test]
async fn redis_cache_custom_prefix() {
    let fixture = RedisFixture::start().await;
    let cache = fixture.cache().await.with_prefix("myapp:url:");
    let mut conn = fixture.connection().await;
    let rec = record(
        "pref123",
        "https://example.com",
        Timestamp::now() + SignedDuration::from_hours(1),
    );

    cache.set_url(&rec).await.unwrap();

    let exists: bool = conn.exists("myapp:url:pref123").await.unwrap();
    assert!(exists);
}

#[tokio::test]
async fn connect_pings_server() {
    let fixture = RedisFixture::start().await;
    let url = fixture.server.url().await.unwrap();

    let cache = RedisUrlCache::connect(&url).await.unwrap();
    assert!(cache
        .get_url(&ShortCode::new("nothing").unwrap())
        .await
        .unwrap()
        .is_none());
}

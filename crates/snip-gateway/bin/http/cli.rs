use clap::{Parser, ValueEnum};
use jiff::SignedDuration;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNIP_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const CODE_LENGTH_ENV: &str = "SNIP_CODE_LENGTH";
pub const DEFAULT_EXPIRATION_ENV: &str = "SNIP_DEFAULT_EXPIRATION";
pub const CLEANUP_INTERVAL_ENV: &str = "SNIP_CLEANUP_INTERVAL";
pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "SNIP_MYSQL_DSN";
pub const MYSQL_MAX_CONNECTIONS_ENV: &str = "SNIP_MYSQL_MAX_CONNECTIONS";
pub const CACHE_BACKEND_ENV: &str = "SNIP_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "SNIP_REDIS_URL";
pub const CACHE_CAPACITY_ENV: &str = "SNIP_CACHE_CAPACITY";
pub const SHUTDOWN_TIMEOUT_ENV: &str = "SNIP_SHUTDOWN_TIMEOUT";
pub const REQUEST_TIMEOUT_ENV: &str = "SNIP_REQUEST_TIMEOUT";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::InMemory => write!(f, "in-memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

/// A duration of zero or more, e.g. `24h`, `90m` or `PT1H`.
fn non_negative_duration(value: &str) -> Result<SignedDuration, String> {
    let duration: SignedDuration = value
        .parse()
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;
    if duration.is_negative() {
        return Err(format!("duration must not be negative: {value}"));
    }
    Ok(duration)
}

fn positive_duration(value: &str) -> Result<Duration, String> {
    let duration = non_negative_duration(value)?;
    if duration.is_zero() {
        return Err(format!("duration must be positive: {value}"));
    }
    Duration::try_from(duration).map_err(|e| format!("invalid duration '{value}': {e}"))
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Public origin prepended to every short code.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Length of generated codes. Bounded by the lengths a redirect accepts.
    #[arg(
        long,
        env = CODE_LENGTH_ENV,
        default_value_t = 7,
        value_parser = clap::value_parser!(u8).range(3..=32)
    )]
    pub code_length: u8,

    #[arg(
        long,
        env = DEFAULT_EXPIRATION_ENV,
        default_value = "24h",
        value_parser = non_negative_duration
    )]
    pub default_expiration: SignedDuration,

    #[arg(
        long,
        env = CLEANUP_INTERVAL_ENV,
        default_value = "1h",
        value_parser = positive_duration
    )]
    pub cleanup_interval: Duration,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = MYSQL_MAX_CONNECTIONS_ENV, default_value_t = 10)]
    pub mysql_max_connections: u32,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::InMemory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    /// Maximum entries held by the in-memory cache.
    #[arg(long, env = CACHE_CAPACITY_ENV, default_value_t = 100_000)]
    pub cache_capacity: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    #[arg(
        long,
        env = SHUTDOWN_TIMEOUT_ENV,
        default_value = "5s",
        value_parser = positive_duration
    )]
    pub shutdown_timeout: Duration,

    /// Deadline for a single request, answered with 408 when exceeded.
    #[arg(
        long,
        env = REQUEST_TIMEOUT_ENV,
        default_value = "30s",
        value_parser = positive_duration
    )]
    pub request_timeout: Duration,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

mod cli;

use crate::cli::{CacheBackendArg, LogFormatArg, StorageBackendArg, CLI};
use clap::Parser;
use snip_cache::{MokaUrlCache, RedisUrlCache};
use snip_core::{Repository, Shortener, UrlCache};
use snip_gateway::{serve, App, AppState};
use snip_generator::{RandomGenerator, RandomGeneratorSettings};
use snip_shortener::{spawn_sweeper, ShortenerConfig, ShortenerService, SweeperConfig};
use snip_storage::{InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// `shutdown` is cancelled by SIGINT/SIGTERM. `engine` is its parent and is
/// only cancelled once the drain deadline passes.
struct Tokens {
    shutdown: CancellationToken,
    engine: CancellationToken,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        code_length = config.code_length,
        default_expiration = ?config.default_expiration,
        cleanup_interval = ?config.cleanup_interval,
        request_timeout = ?config.request_timeout,
        "starting gateway server"
    );

    // The engine token outlives the shutdown signal so in-flight requests can
    // drain. It is only cancelled when the drain times out.
    let engine = CancellationToken::new();
    let shutdown = engine.child_token();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    let tokens = Tokens { shutdown, engine };

    match config.storage {
        StorageBackendArg::InMemory => {
            with_cache(&config, Arc::new(InMemoryRepository::new()), tokens).await?;
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let repository =
                Arc::new(MySqlRepository::connect(mysql_dsn, config.mysql_max_connections).await?);
            repository.migrate().await?;

            let result = with_cache(&config, Arc::clone(&repository), tokens).await;
            repository.close().await;
            info!("closed mysql pool");
            result?;
        }
    }

    info!("gateway stopped");
    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Json => builder.json().init(),
        LogFormatArg::Text => builder.init(),
    }
}

async fn with_cache<R: Repository>(
    config: &CLI,
    repository: Arc<R>,
    tokens: Tokens,
) -> Result<(), BoxError> {
    match config.cache {
        CacheBackendArg::InMemory => {
            let cache = MokaUrlCache::with_capacity(config.cache_capacity);
            run_server(config, repository, Arc::new(cache), tokens).await
        }
        CacheBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .ok_or("redis url is required when cache backend is redis")?;
            let cache = RedisUrlCache::connect(redis_url).await?;
            run_server(config, repository, Arc::new(cache), tokens).await
        }
    }
}

async fn run_server<R: Repository, C: UrlCache>(
    config: &CLI,
    repository: Arc<R>,
    cache: Arc<C>,
    tokens: Tokens,
) -> Result<(), BoxError> {
    let generator = RandomGenerator::new(
        RandomGeneratorSettings::builder()
            .length(usize::from(config.code_length))
            .build(),
    )?;

    let service = ShortenerService::builder()
        .repository(repository)
        .cache(cache)
        .generator(Arc::new(generator))
        .config(ShortenerConfig {
            default_expiration: config.default_expiration,
        })
        .cancel(tokens.engine.clone())
        .build();
    let shortener: Arc<dyn Shortener> = Arc::new(service);

    let sweeper = spawn_sweeper(
        Arc::clone(&shortener),
        SweeperConfig {
            interval: config.cleanup_interval,
        },
        tokens.shutdown.clone(),
    );

    let app = App::with_request_timeout(
        AppState::new(shortener, config.base_url.clone()),
        config.request_timeout,
    );
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    let served = serve(
        listener,
        app,
        tokens.shutdown,
        tokens.engine,
        config.shutdown_timeout,
    )
    .await;

    sweeper.await?;
    served?;
    Ok(())
}

/// Cancels `cancel` on SIGINT or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("received SIGTERM, initiating graceful shutdown"),
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}

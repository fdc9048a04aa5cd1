use axum::Router;
use std::io;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Serves `router` on `listener` until `shutdown` fires.
///
/// After `shutdown` fires no new connections are accepted and in-flight
/// requests run to completion. If they are still running after
/// `drain_timeout`, `engine` is cancelled so pending engine calls fail fast,
/// and the remaining connections are aborted.
///
/// The server exiting on its own cancels `shutdown` so the other tasks
/// observing it stop too.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
    engine: CancellationToken,
    drain_timeout: Duration,
) -> io::Result<()> {
    let signal = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
    });

    tokio::select! {
        result = &mut server => {
            shutdown.cancel();
            result.map_err(io::Error::other)?
        }
        _ = shutdown.cancelled() => {
            info!(timeout = ?drain_timeout, "draining in-flight requests");
            match tokio::time::timeout(drain_timeout, &mut server).await {
                Ok(result) => result.map_err(io::Error::other)?,
                Err(_) => {
                    warn!(
                        timeout = ?drain_timeout,
                        "graceful shutdown timed out, aborting connections"
                    );
                    engine.cancel();
                    server.abort();
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, AppState};
    use async_trait::async_trait;
    use jiff::{SignedDuration, Timestamp};
    use snip_core::{ShortCode, ShortenParams, Shortener, ShortenerError, UrlRecord};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::Notify;

    /// Resolves every code after `delay`, unless `engine` fires first.
    struct SlowShortener {
        delay: Duration,
        started: Arc<Notify>,
        engine: CancellationToken,
    }

    #[async_trait]
    impl Shortener for SlowShortener {
        async fn shorten(&self, _params: ShortenParams) -> Result<UrlRecord, ShortenerError> {
            Err(ShortenerError::Cancelled)
        }

        async fn resolve(&self, code: &ShortCode) -> Result<Option<UrlRecord>, ShortenerError> {
            self.started.notify_one();
            tokio::select! {
                _ = self.engine.cancelled() => Err(ShortenerError::Cancelled),
                _ = tokio::time::sleep(self.delay) => Ok(Some(UrlRecord {
                    id: 1,
                    short_code: code.clone(),
                    original_url: "https://example.com".to_string(),
                    is_custom: false,
                    expires_at: Timestamp::now() + SignedDuration::from_hours(1),
                    created_at: Timestamp::now(),
                })),
            }
        }

        async fn cleanup_expired(&self) -> Result<u64, ShortenerError> {
            Ok(0)
        }
    }

    struct Running {
        addr: std::net::SocketAddr,
        started: Arc<Notify>,
        shutdown: CancellationToken,
        engine: CancellationToken,
        server: tokio::task::JoinHandle<io::Result<()>>,
    }

    async fn start(delay: Duration, drain_timeout: Duration) -> Running {
        let engine = CancellationToken::new();
        let shutdown = engine.child_token();
        let started = Arc::new(Notify::new());
        let shortener = SlowShortener {
            delay,
            started: Arc::clone(&started),
            engine: engine.clone(),
        };
        let router = App::router(AppState::new(Arc::new(shortener), "https://sn.ip"));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(
            listener,
            router,
            shutdown.clone(),
            engine.clone(),
            drain_timeout,
        ));

        Running {
            addr,
            started,
            shutdown,
            engine,
            server,
        }
    }

    async fn send_redirect_request(addr: std::net::SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /abc1234 HTTP/1.1\r\nhost: sn.ip\r\nconnection: close\r\n\r\n")
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn in_flight_request_completes_after_shutdown_signal() {
        let running = start(Duration::from_millis(200), Duration::from_secs(5)).await;

        let mut stream = send_redirect_request(running.addr).await;
        running.started.notified().await;
        running.shutdown.cancel();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 302"), "{response}");
        assert!(response.contains("https://example.com"), "{response}");

        running.server.await.unwrap().unwrap();
        assert!(!running.engine.is_cancelled());
    }

    #[tokio::test]
    async fn drain_timeout_cancels_engine() {
        let running = start(Duration::from_secs(600), Duration::from_millis(50)).await;

        let _stream = send_redirect_request(running.addr).await;
        running.started.notified().await;
        running.shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), running.server)
            .await
            .expect("server stops after the drain timeout")
            .unwrap()
            .unwrap();
        assert!(running.engine.is_cancelled());
    }

    #[tokio::test]
    async fn idle_server_stops_on_shutdown() {
        let running = start(Duration::ZERO, Duration::from_secs(5)).await;

        running.shutdown.cancel();

        running.server.await.unwrap().unwrap();
        assert!(!running.engine.is_cancelled());
    }
}

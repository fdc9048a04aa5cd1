use snip_core::Shortener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the background expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Fixed delay between sweeps. Failures do not change it.
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Spawns a task that calls [`Shortener::cleanup_expired`] every
/// `config.interval` until `cancel` fires.
///
/// The first sweep runs one full interval after spawning. A failed sweep is
/// logged and the next one runs on schedule.
pub fn spawn_sweeper<S>(
    shortener: Arc<S>,
    config: SweeperConfig,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: Shortener + ?Sized,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?config.interval, "Expiry sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match shortener.cleanup_expired().await {
                Ok(0) => debug!("Expiry sweep found nothing to purge"),
                Ok(removed) => info!(removed, "Purged expired short URLs"),
                Err(e) => warn!(error = %e, "Expiry sweep failed"),
            }
        }

        info!("Expiry sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snip_core::{ShortCode, ShortenParams, ShortenerError, StorageError, UrlRecord};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingShortener {
        sweeps: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Shortener for CountingShortener {
        async fn shorten(&self, _params: ShortenParams) -> Result<UrlRecord, ShortenerError> {
            unreachable!("sweeper never creates records")
        }

        async fn resolve(&self, _code: &ShortCode) -> Result<Option<UrlRecord>, ShortenerError> {
            unreachable!("sweeper never resolves codes")
        }

        async fn cleanup_expired(&self) -> Result<u64, ShortenerError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("db down".to_string()).into());
            }
            Ok(3)
        }
    }

    fn config() -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_sweep_waits_one_interval() {
        let shortener = Arc::new(CountingShortener::default());
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&shortener), config(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_fixed_interval() {
        let shortener = Arc::new(CountingShortener::default());
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&shortener), config(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(60 * 5 + 1)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 5);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_timer() {
        let shortener = Arc::new(CountingShortener::default());
        shortener.fail.store(true, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&shortener), config(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(60 * 3 + 1)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_task() {
        let shortener = Arc::new(CountingShortener::default());
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(Arc::clone(&shortener), config(), cancel.clone());

        cancel.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn works_with_a_trait_object() {
        let shortener = Arc::new(CountingShortener::default());
        let dynamic: Arc<dyn Shortener> = shortener.clone();
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(dynamic, config(), cancel.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(shortener.sweeps.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}

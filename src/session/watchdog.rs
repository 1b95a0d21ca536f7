//! Host watchdog for connect attempts

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Run `on_expiry(generation)` once `after` has elapsed
///
/// `on_expiry` reports whether the attempt was still pending and got
/// failed; attempts that settled in time are left alone.
pub(super) fn arm<F, Fut>(after: Duration, generation: u64, on_expiry: F) -> JoinHandle<()>
where
    F: FnOnce(u64) -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    debug!("Watchdog armed for attempt {} ({:?})", generation, after);
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if on_expiry(generation).await {
            warn!("Connect attempt {} timed out after {:?}", generation, after);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&fired);

        let task = arm(Duration::from_secs(30), 7, move |g| async move {
            seen.store(g, Ordering::SeqCst);
            true
        });

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        task.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 7);
    }
}

//! Single scheduler primitive used by every long-running loop in this
//! workspace (EVM watcher, Bitcoin watcher, UDA watcher, both executors),
//! replacing what the spec's source described as ad-hoc `setInterval`-style
//! polling (§9 design note: "a single scheduler primitive").
//!
//! Cancellation is checked both before and during the sleep, at a granularity
//! fine enough to meet the <1s graceful-shutdown target in §5.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

const SHUTDOWN_CHECK_GRANULARITY: Duration = Duration::from_millis(100);

/// Runs `body` repeatedly, sleeping `interval` between iterations, until
/// `stop` is cancelled. `body` receives no arguments and is expected to close
/// over whatever state it needs; errors are the caller's responsibility to
/// log and decide whether to continue (this primitive never halts the loop
/// on an `Err` — per-iteration failure handling is component-specific, see
/// each watcher/executor's own retry policy).
pub async fn run_scheduled<F, Fut>(interval: Duration, stop: CancellationToken, mut body: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if stop.is_cancelled() {
            return;
        }

        body().await;

        if !sleep_cancellable(interval, &stop).await {
            return;
        }
    }
}

/// Sleeps up to `duration`, waking early (and returning `false`) if `stop` is
/// cancelled mid-sleep. Returns `true` if the full duration elapsed.
pub async fn sleep_cancellable(duration: Duration, stop: &CancellationToken) -> bool {
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if stop.is_cancelled() {
            return false;
        }
        let step = remaining.min(SHUTDOWN_CHECK_GRANULARITY);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
    !stop.is_cancelled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn stops_promptly_after_cancellation() {
        let stop = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));

        let loop_count = count.clone();
        let loop_stop = stop.clone();
        let handle = tokio::spawn(async move {
            run_scheduled(Duration::from_secs(1), loop_stop, || {
                let count = loop_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::advance(Duration::from_millis(50)).await;
        stop.cancel();
        tokio::time::advance(Duration::from_millis(200)).await;
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_again_after_full_interval_elapses() {
        let stop = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));

        let loop_count = count.clone();
        let loop_stop = stop.clone();
        let handle = tokio::spawn(async move {
            run_scheduled(Duration::from_millis(300), loop_stop, || {
                let count = loop_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
        });

        tokio::time::advance(Duration::from_millis(350)).await;
        stop.cancel();
        tokio::time::advance(Duration::from_secs(1)).await;
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}

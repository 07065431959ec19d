//! Debounced progress reporting.
//!
//! An all-cache-hit query can report completion thousands of times within
//! a millisecond, one report per resolved key. Observers only care about
//! the settled value, so raw reports are debounced: a single pending slot
//! holds the most recent fraction, and a timer delivers it to the
//! observable channel on the trailing edge of each burst. A report that
//! arrives while the timer is pending replaces the slot without
//! rescheduling, so the last report of a burst is always the one
//! delivered.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug)]
struct PendingSlot {
    /// Most recent reported fraction not yet delivered.
    value: Option<f64>,
    /// Whether a delivery timer is currently running.
    timer_armed: bool,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<f64>,
    pending: Mutex<PendingSlot>,
}

/// Rate-limited progress signal for the current query generation.
///
/// Cloning shares the underlying channel and pending slot.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
    window: Duration,
}

impl ProgressReporter {
    /// Create a reporter with the given debounce window.
    pub fn new(window: Duration) -> Self {
        let (tx, _) = watch::channel(0.0);
        Self {
            inner: Arc::new(Inner {
                tx,
                pending: Mutex::new(PendingSlot {
                    value: None,
                    timer_armed: false,
                }),
            }),
            window,
        }
    }

    /// Subscribe to delivered progress values.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.inner.tx.subscribe()
    }

    /// The most recently delivered fraction.
    pub fn current(&self) -> f64 {
        *self.inner.tx.borrow()
    }

    /// Reset the observable progress to zero at the start of a generation.
    ///
    /// Delivered immediately, not debounced; any pending report from the
    /// previous generation is dropped. A timer already armed stays armed
    /// and finds an empty slot when it fires.
    pub fn reset(&self) {
        let mut pending = self.inner.pending.lock().unwrap();
        pending.value = None;
        self.inner.tx.send_replace(0.0);
    }

    /// Report a raw fraction in `[0, 1]`.
    ///
    /// Must be called from within a tokio runtime; delivery happens after
    /// the debounce window elapses.
    pub fn report(&self, fraction: f64) {
        let mut pending = self.inner.pending.lock().unwrap();
        pending.value = Some(fraction);
        if pending.timer_armed {
            return;
        }
        pending.timer_armed = true;

        let inner = Arc::clone(&self.inner);
        let deadline = tokio::time::Instant::now() + self.window;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let delivered = {
                let mut pending = inner.pending.lock().unwrap();
                pending.timer_armed = false;
                pending.value.take()
            };
            if let Some(fraction) = delivered {
                inner.tx.send_replace(fraction);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_millis(50);

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_final_value() {
        let reporter = ProgressReporter::new(WINDOW);
        let rx = reporter.subscribe();

        for i in 1..=1000u32 {
            reporter.report(f64::from(i) / 1000.0);
        }
        assert_eq!(reporter.current(), 0.0);

        advance(WINDOW + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(*rx.borrow(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_bounded_updates() {
        let reporter = ProgressReporter::new(WINDOW);
        let mut rx = reporter.subscribe();

        for i in 1..=500u32 {
            reporter.report(f64::from(i) / 500.0);
        }
        advance(WINDOW + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        // A single delivery for the whole burst.
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1.0);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn late_report_replaces_pending_value() {
        let reporter = ProgressReporter::new(WINDOW);

        reporter.report(0.25);
        advance(Duration::from_millis(30)).await;
        tokio::task::yield_now().await;
        reporter.report(0.75);
        advance(Duration::from_millis(21)).await;
        tokio::task::yield_now().await;

        assert_eq!(reporter.current(), 0.75);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_deliver_separately() {
        let reporter = ProgressReporter::new(WINDOW);

        reporter.report(0.5);
        advance(WINDOW + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(reporter.current(), 0.5);

        reporter.report(1.0);
        advance(WINDOW + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(reporter.current(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_pending_report() {
        let reporter = ProgressReporter::new(WINDOW);

        reporter.report(0.9);
        reporter.reset();
        assert_eq!(reporter.current(), 0.0);

        advance(WINDOW + Duration::from_millis(1)).await;
        // The armed timer found an empty slot; nothing stale delivered.
        assert_eq!(reporter.current(), 0.0);
    }
}

//! The countdown shown with the session warning.
//!
//! Runs on its own clock, ticking once per second from the configured lead
//! time down to zero, so that it reaches zero at the same instant as the
//! session timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::session::Callback;

pub const TICK: Duration = Duration::from_secs(1);

pub type TickCallback = Arc<dyn Fn(Duration) + Send + Sync>;

pub struct Countdown {
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Calls `on_tick` immediately with `total`, then every [`TICK`] with the
    /// time left (ending with zero), then `on_finish`.
    pub fn start(total: Duration, on_tick: TickCallback, on_finish: Callback) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let deadline = Instant::now() + total;

        let handle = tokio::spawn(async move {
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                on_tick(remaining);
                if remaining.is_zero() {
                    break;
                }
                sleep(remaining.min(TICK)).await;
            }
            if !flag.load(Ordering::SeqCst) {
                on_finish();
            }
        });

        Countdown {
            cancelled,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Formats time left as `m:ss`, rounding partial seconds up.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_millis().div_ceil(1000);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, TickCallback) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&ticks);
        let callback: TickCallback =
            Arc::new(move |d: Duration| t.lock().push(d.as_millis() as u64));
        (ticks, callback)
    }

    fn finisher() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let callback: Callback = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(120)), "2:00");
        assert_eq!(format_remaining(Duration::from_secs(65)), "1:05");
        assert_eq!(format_remaining(Duration::from_millis(1500)), "0:02");
        assert_eq!(format_remaining(Duration::ZERO), "0:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_to_zero_then_finishes() {
        let (ticks, on_tick) = recorder();
        let (finished, on_finish) = finisher();
        let _countdown = Countdown::start(Duration::from_secs(3), on_tick, on_finish);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(*ticks.lock(), vec![3000, 2000, 1000]);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(600)).await;
        assert_eq!(*ticks.lock(), vec![3000, 2000, 1000, 0]);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_lead_time() {
        let (ticks, on_tick) = recorder();
        let (finished, on_finish) = finisher();
        let _countdown = Countdown::start(Duration::from_millis(1500), on_tick, on_finish);

        sleep(Duration::from_millis(1600)).await;
        assert_eq!(*ticks.lock(), vec![1500, 500, 0]);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_finish() {
        let (_ticks, on_tick) = recorder();
        let (finished, on_finish) = finisher();
        let mut countdown = Countdown::start(Duration::from_secs(2), on_tick, on_finish);

        sleep(Duration::from_millis(1500)).await;
        countdown.stop();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}

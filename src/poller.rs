//! Fixed-interval refresh of the ticket list.
//!
//! Fetches never overlap: the next tick is only awaited once the previous
//! fetch has completed and its result was handed to the consumer.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::TicketSource;
use crate::models::TicketRecord;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Keeps a tiny configured interval from turning into a busy loop.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    Tickets(Vec<TicketRecord>),
    /// `first` is set on the first failure after a success, so the consumer
    /// can report a streak once instead of every cycle.
    Failed { message: String, first: bool },
    /// The server rejected the session token. Polling stops after this.
    Unauthorized,
}

pub struct Poller<S> {
    source: S,
    interval: Duration,
    refresh: Arc<Notify>,
    failing: bool,
}

impl<S: TicketSource + 'static> Poller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Poller {
            source,
            interval: interval.max(MIN_POLL_INTERVAL),
            refresh: Arc::new(Notify::new()),
            failing: false,
        }
    }

    /// Notifying this handle fetches immediately instead of waiting for the
    /// next tick.
    pub fn refresh_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.refresh)
    }

    pub async fn poll_once(&mut self) -> PollUpdate {
        match self.source.fetch_tickets().await {
            Ok(tickets) => {
                if self.failing {
                    debug!("ticket fetch recovered");
                }
                self.failing = false;
                PollUpdate::Tickets(tickets)
            }
            Err(e) if e.is_unauthorized() => {
                warn!(error = %e, "session token rejected, stopping refresh");
                PollUpdate::Unauthorized
            }
            Err(e) => {
                let first = !self.failing;
                self.failing = true;
                warn!(error = %e, "could not load tickets");
                PollUpdate::Failed {
                    message: e.to_string(),
                    first,
                }
            }
        }
    }

    pub async fn run(mut self, tx: mpsc::Sender<PollUpdate>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let refresh = Arc::clone(&self.refresh);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = refresh.notified() => ticker.reset(),
            }
            let update = self.poll_once().await;
            let rejected = update == PollUpdate::Unauthorized;
            if tx.send(update).await.is_err() {
                debug!("poll consumer gone, stopping");
                break;
            }
            if rejected {
                break;
            }
        }
    }

    pub fn spawn(self, tx: mpsc::Sender<PollUpdate>) -> JoinHandle<()> {
        tokio::spawn(self.run(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<TicketRecord>, u16>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(script: Vec<Result<Vec<TicketRecord>, u16>>) -> Arc<Self> {
            Arc::new(ScriptedSource {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TicketSource for Arc<ScriptedSource> {
        async fn fetch_tickets(&self) -> Result<Vec<TicketRecord>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().pop_front() {
                Some(Ok(tickets)) => Ok(tickets),
                Some(Err(status)) => Err(ApiError::Http {
                    status,
                    message: "Error".to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    // ==================== Unit Tests ====================

    #[tokio::test]
    async fn test_failure_streak_reported_once() {
        let source = ScriptedSource::with(vec![Err(500), Err(502), Ok(Vec::new()), Err(500)]);
        let mut poller = Poller::new(source, DEFAULT_POLL_INTERVAL);

        let firsts: Vec<Option<bool>> = {
            let mut out = Vec::new();
            for _ in 0..4 {
                out.push(match poller.poll_once().await {
                    PollUpdate::Failed { first, .. } => Some(first),
                    PollUpdate::Tickets(_) | PollUpdate::Unauthorized => None,
                });
            }
            out
        };
        assert_eq!(firsts, vec![Some(true), Some(false), None, Some(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_every_interval() {
        let source = ScriptedSource::with(Vec::new());
        let poller = Poller::new(Arc::clone(&source), Duration::from_secs(2));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = poller.spawn(tx);

        sleep(Duration::from_millis(4500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fetches_early() {
        let source = ScriptedSource::with(Vec::new());
        let poller = Poller::new(Arc::clone(&source), Duration::from_secs(60));
        let refresh = poller.refresh_handle();
        let (tx, _rx) = mpsc::channel(16);
        let handle = poller.spawn(tx);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        refresh.notify_one();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_consumer_drops() {
        let source = ScriptedSource::with(Vec::new());
        let poller = Poller::new(Arc::clone(&source), Duration::from_secs(1));
        let (tx, rx) = mpsc::channel(16);
        let handle = poller.spawn(tx);
        drop(rx);

        sleep(Duration::from_secs(5)).await;
        assert!(handle.is_finished());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_token_stops_polling() {
        let source = ScriptedSource::with(vec![Ok(Vec::new()), Err(401)]);
        let poller = Poller::new(Arc::clone(&source), Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = poller.spawn(tx);

        sleep(Duration::from_secs(10)).await;
        assert!(handle.is_finished());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_recv().ok(), Some(PollUpdate::Tickets(Vec::new())));
        assert_eq!(rx.try_recv().ok(), Some(PollUpdate::Unauthorized));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_interval_has_floor() {
        let poller = Poller::new(ScriptedSource::with(Vec::new()), Duration::ZERO);
        assert_eq!(poller.interval, MIN_POLL_INTERVAL);
    }
}

//! Inactivity timer with a warning stage.
//!
//! `arm` schedules a warning `inactivity_timeout - warning_lead` from now and
//! a timeout at `inactivity_timeout`. Qualifying activity re-arms both, at
//! most once per second. Timers run as tokio tasks; every re-arm cancels the
//! previous pair before scheduling, and a generation counter makes a
//! cancelled pair inert even if it was already due.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Activity closer together than this counts as one reset.
pub const ACTIVITY_DEBOUNCE: Duration = Duration::from_secs(1);

pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(40 * 60);
pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(2 * 60);

pub type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    Touch,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disarmed,
    Timing,
    WarningShown,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub inactivity_timeout: Duration,
    pub warning_lead: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            warning_lead: DEFAULT_WARNING_LEAD,
        }
    }
}

impl TimeoutConfig {
    /// Delay from arming until the warning fires. `None` when the lead time
    /// leaves no room before the timeout.
    pub fn warning_delay(&self) -> Option<Duration> {
        self.inactivity_timeout
            .checked_sub(self.warning_lead)
            .filter(|d| !d.is_zero())
    }
}

#[derive(Clone)]
struct Callbacks {
    on_timeout: Callback,
    on_warning: Option<Callback>,
}

struct Inner {
    generation: u64,
    phase: SessionPhase,
    last_activity_at: Instant,
    warning: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
    callbacks: Option<Callbacks>,
}

impl Inner {
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.warning.take() {
            handle.abort();
        }
        if let Some(handle) = self.timeout.take() {
            handle.abort();
        }
    }
}

#[derive(Clone, Copy)]
enum Fire {
    Warning,
    Timeout,
}

/// Must be used from within a tokio runtime.
pub struct SessionTimeout {
    config: TimeoutConfig,
    inner: Arc<Mutex<Inner>>,
}

impl SessionTimeout {
    pub fn new(config: TimeoutConfig) -> Self {
        if config.warning_delay().is_none() {
            warn!(
                timeout = ?config.inactivity_timeout,
                lead = ?config.warning_lead,
                "warning lead time is not shorter than the inactivity timeout, warnings disabled"
            );
        }
        SessionTimeout {
            config,
            inner: Arc::new(Mutex::new(Inner {
                generation: 0,
                phase: SessionPhase::Disarmed,
                last_activity_at: Instant::now(),
                warning: None,
                timeout: None,
                callbacks: None,
            })),
        }
    }

    pub fn config(&self) -> TimeoutConfig {
        self.config
    }

    /// (Re)starts both timers from now, cancelling any pending ones first.
    pub fn arm(&self, on_timeout: Callback, on_warning: Option<Callback>) {
        let mut inner = self.inner.lock();
        inner.callbacks = Some(Callbacks {
            on_timeout,
            on_warning,
        });
        self.schedule(&mut inner);
    }

    /// Restarts the countdown with the callbacks of the last `arm`.
    /// Returns false when the controller is not armed.
    pub fn reset_timer(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.callbacks.is_none() {
            return false;
        }
        self.schedule(&mut inner);
        true
    }

    /// Cancels both pending timers without firing them.
    pub fn disarm(&self) {
        let mut inner = self.inner.lock();
        inner.cancel();
        inner.callbacks = None;
        if inner.phase != SessionPhase::Expired {
            inner.phase = SessionPhase::Disarmed;
        }
    }

    /// Cancels pending timers and marks the session expired. Used when the
    /// expiry is reached through another clock.
    pub fn expire(&self) {
        let mut inner = self.inner.lock();
        inner.cancel();
        inner.callbacks = None;
        inner.phase = SessionPhase::Expired;
    }

    /// Re-arms on activity when more than [`ACTIVITY_DEBOUNCE`] has passed
    /// since the last reset. Activity only counts while the idle timer runs;
    /// once the warning is up only an explicit reset continues the session.
    pub fn record_activity(&self, kind: ActivityKind) -> bool {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Timing {
            return false;
        }
        if inner.last_activity_at.elapsed() <= ACTIVITY_DEBOUNCE {
            return false;
        }
        debug!(?kind, "activity, resetting session timer");
        self.schedule(&mut inner);
        true
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    /// Time left until the timeout fires, if armed.
    pub fn remaining(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match inner.phase {
            SessionPhase::Timing | SessionPhase::WarningShown => Some(
                (inner.last_activity_at + self.config.inactivity_timeout)
                    .saturating_duration_since(Instant::now()),
            ),
            SessionPhase::Disarmed | SessionPhase::Expired => None,
        }
    }

    fn schedule(&self, inner: &mut Inner) {
        inner.cancel();
        inner.last_activity_at = Instant::now();
        inner.phase = SessionPhase::Timing;
        let generation = inner.generation;

        let wants_warning = inner
            .callbacks
            .as_ref()
            .is_some_and(|c| c.on_warning.is_some());
        if wants_warning {
            if let Some(delay) = self.config.warning_delay() {
                inner.warning = Some(spawn_timer(
                    Arc::clone(&self.inner),
                    generation,
                    delay,
                    Fire::Warning,
                ));
            }
        }

        inner.timeout = Some(spawn_timer(
            Arc::clone(&self.inner),
            generation,
            self.config.inactivity_timeout,
            Fire::Timeout,
        ));
    }
}

impl Drop for SessionTimeout {
    fn drop(&mut self) {
        self.inner.lock().cancel();
    }
}

fn spawn_timer(
    shared: Arc<Mutex<Inner>>,
    generation: u64,
    delay: Duration,
    fire: Fire,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;

        let callback = {
            let mut inner = shared.lock();
            if inner.generation != generation {
                return;
            }
            match fire {
                Fire::Warning => {
                    inner.warning = None;
                    inner.phase = SessionPhase::WarningShown;
                    inner.callbacks.as_ref().and_then(|c| c.on_warning.clone())
                }
                Fire::Timeout => {
                    inner.timeout = None;
                    inner.phase = SessionPhase::Expired;
                    inner.callbacks.as_ref().map(|c| Arc::clone(&c.on_timeout))
                }
            }
        };

        // Run outside the lock so callbacks may call back into the controller.
        if let Some(callback) = callback {
            callback();
        }
    })
}

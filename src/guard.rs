//! Ties the inactivity timer to whatever surface displays the session.
//!
//! Idle timing -> warning shown (with a countdown) -> expired. From the
//! warning the user may continue (timers restart) or log out. Expiry is
//! reached by either the timer's timeout or the countdown reaching zero,
//! whichever runs first; the forced logout happens exactly once.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::info;

use crate::countdown::{Countdown, TickCallback};
use crate::session::{ActivityKind, Callback, SessionPhase, SessionTimeout, TimeoutConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Inactivity; the login surface should say the session expired.
    SessionExpired,
    UserRequested,
}

impl LogoutReason {
    pub fn session_expired(self) -> bool {
        self == LogoutReason::SessionExpired
    }
}

/// Where the viewer currently is. Login and registration are never timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Tickets,
    TicketDetail(i64),
    CreateTicket,
}

impl Route {
    pub fn is_protected(self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }
}

/// The UI side of the session: renders the warning and performs logouts.
pub trait SessionHost: Send + Sync {
    fn show_warning(&self, remaining: Duration);
    fn tick(&self, remaining: Duration);
    fn hide_warning(&self);
    fn logout(&self, reason: LogoutReason);
}

#[derive(Default)]
struct GuardState {
    countdown: Option<Countdown>,
    warning_visible: bool,
    logged_out: bool,
}

struct GuardInner {
    timer: SessionTimeout,
    host: Arc<dyn SessionHost>,
    state: Mutex<GuardState>,
}

impl GuardInner {
    fn on_warning(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.logged_out {
            return;
        }
        let lead = self.timer.config().warning_lead;
        state.warning_visible = true;

        let host = Arc::clone(&self.host);
        let on_tick: TickCallback = Arc::new(move |remaining: Duration| host.tick(remaining));
        let weak = Arc::downgrade(self);
        let on_finish: Callback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.end(LogoutReason::SessionExpired);
            }
        });
        state.countdown = Some(Countdown::start(lead, on_tick, on_finish));
        drop(state);

        self.host.show_warning(lead);
    }

    /// Hides the warning and stops the countdown. Returns whether the
    /// warning was visible.
    fn close_warning(&self) -> bool {
        let (countdown, was_visible) = {
            let mut state = self.state.lock();
            let was_visible = std::mem::take(&mut state.warning_visible);
            (state.countdown.take(), was_visible)
        };
        if let Some(mut countdown) = countdown {
            countdown.stop();
        }
        if was_visible {
            self.host.hide_warning();
        }
        was_visible
    }

    fn end(&self, reason: LogoutReason) {
        {
            let mut state = self.state.lock();
            if state.logged_out {
                return;
            }
            state.logged_out = true;
        }
        match reason {
            LogoutReason::SessionExpired => self.timer.expire(),
            LogoutReason::UserRequested => self.timer.disarm(),
        }
        self.close_warning();
        info!(?reason, "session ended");
        self.host.logout(reason);
    }
}

pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    pub fn new(config: TimeoutConfig, host: Arc<dyn SessionHost>) -> Self {
        SessionGuard {
            inner: Arc::new(GuardInner {
                timer: SessionTimeout::new(config),
                host,
                state: Mutex::new(GuardState::default()),
            }),
        }
    }

    /// Starts timing when an authenticated viewer is on a protected route;
    /// stops it otherwise.
    pub fn enter(&self, route: Route, authenticated: bool) {
        if !(authenticated && route.is_protected()) {
            self.teardown();
            return;
        }

        self.inner.state.lock().logged_out = false;
        // Re-arming restarts both clocks, so a countdown from the previous
        // cycle must not outlive it.
        self.inner.close_warning();

        let weak: Weak<GuardInner> = Arc::downgrade(&self.inner);
        let on_timeout: Callback = {
            let weak = weak.clone();
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.end(LogoutReason::SessionExpired);
                }
            })
        };
        let on_warning: Callback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_warning();
            }
        });
        self.inner.timer.arm(on_timeout, Some(on_warning));
    }

    pub fn record_activity(&self, kind: ActivityKind) -> bool {
        if self.inner.state.lock().warning_visible {
            return false;
        }
        self.inner.timer.record_activity(kind)
    }

    /// "Continue session" from the warning.
    pub fn continue_session(&self) -> bool {
        if self.inner.state.lock().logged_out {
            return false;
        }
        self.inner.close_warning();
        self.inner.timer.reset_timer()
    }

    /// "Log out now" from the warning or anywhere else.
    pub fn logout_now(&self) {
        self.inner.end(LogoutReason::UserRequested);
    }

    /// Ends the session as expired without waiting for the timers, e.g. when
    /// the server no longer accepts the token.
    pub fn expire_now(&self) {
        self.inner.end(LogoutReason::SessionExpired);
    }

    /// Cancels all timers without logging out, e.g. when leaving the
    /// authenticated area through another path.
    pub fn teardown(&self) {
        self.inner.timer.disarm();
        self.inner.close_warning();
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.timer.phase()
    }

    /// Time left before the forced logout, if timing.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.timer.remaining()
    }

    pub fn warning_visible(&self) -> bool {
        self.inner.state.lock().warning_visible
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}

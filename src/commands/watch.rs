//! Interactive ticket watch: polling, change notifications and the
//! inactivity timeout running together until the session ends.

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::debug;

use super::logout::revoke;
use super::require_login;
use ticketwatch::auth;
use ticketwatch::config::Settings;
use ticketwatch::countdown::format_remaining;
use ticketwatch::db::{Database, KeyValueStore, MemoryStore};
use ticketwatch::guard::{LogoutReason, Route, SessionGuard, SessionHost};
use ticketwatch::messages::Message;
use ticketwatch::models::Language;
use ticketwatch::notifications::{NotificationEngine, NotificationEvent, Severity, TOAST_TTL_MS};
use ticketwatch::poller::{PollUpdate, Poller};
use ticketwatch::session::ActivityKind;
use ticketwatch::sound::{Silent, SoundCue, TerminalBell};

/// Signal checks and toast expiry run at this rate.
const HOUSEKEEPING_TICK: Duration = Duration::from_millis(250);

pub struct WatchOptions {
    pub ephemeral: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum HostEvent {
    ShowWarning(Duration),
    Tick(Duration),
    HideWarning,
    Logout(LogoutReason),
}

/// Forwards session callbacks to the watch loop, which owns the terminal.
struct TerminalHost {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl TerminalHost {
    fn send(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            debug!("watch loop gone, dropping session event");
        }
    }
}

impl SessionHost for TerminalHost {
    fn show_warning(&self, remaining: Duration) {
        self.send(HostEvent::ShowWarning(remaining));
    }

    fn tick(&self, remaining: Duration) {
        self.send(HostEvent::Tick(remaining));
    }

    fn hide_warning(&self) {
        self.send(HostEvent::HideWarning);
    }

    fn logout(&self, reason: LogoutReason) {
        self.send(HostEvent::Logout(reason));
    }
}

#[derive(Debug, PartialEq)]
enum Input {
    Continue,
    Quit,
    Refresh,
    List,
    Dismiss(String),
    Other,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "c" => Input::Continue,
        "q" => Input::Quit,
        "r" => Input::Refresh,
        "n" => Input::List,
        _ => match line.strip_prefix("d ") {
            Some(id) if !id.trim().is_empty() => Input::Dismiss(id.trim().to_string()),
            _ => Input::Other,
        },
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "+",
        Severity::Info => "*",
        Severity::Warning => "!",
    }
}

fn format_event(event: &NotificationEvent) -> String {
    format!(
        "[{}] {}  ({})",
        severity_marker(event.kind.severity()),
        event.message,
        event.id
    )
}

/// Active notifications, oldest first, optionally followed by the time left
/// in the session.
fn format_queue(
    events: &[NotificationEvent],
    remaining: Option<Duration>,
    lang: Language,
) -> String {
    let mut out = String::new();
    if events.is_empty() {
        out.push_str(Message::NoNotifications.text(lang));
        out.push('\n');
    }
    for event in events {
        out.push_str(&format_event(event));
        out.push('\n');
    }
    if let Some(remaining) = remaining {
        out.push_str(&format!(
            "{} {}\n",
            Message::SessionRemaining.text(lang),
            format_remaining(remaining)
        ));
    }
    out
}

pub async fn run(db: Arc<Database>, settings: &Settings, options: WatchOptions) -> Result<()> {
    let lang = settings.lang;
    let (credentials, client) = require_login(db.as_ref(), settings)?;
    let privileged = credentials.user.is_privileged();

    let state_store: Arc<dyn KeyValueStore> = if options.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        db.clone()
    };
    let cue: Arc<dyn SoundCue> = if options.quiet {
        Arc::new(Silent)
    } else {
        Arc::new(TerminalBell)
    };
    let mut engine = NotificationEngine::open(state_store, cue, lang);

    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    let guard = SessionGuard::new(settings.timeout, Arc::new(TerminalHost { tx: host_tx }));
    guard.enter(Route::Tickets, true);

    let (poll_tx, mut poll_rx) = mpsc::channel(4);
    let poller = Poller::new(client.clone(), settings.poll_interval);
    let refresh = poller.refresh_handle();
    let poll_task = poller.spawn(poll_tx);

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("Failed to register signal handler")?;
    }

    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;
    let mut housekeeping = interval(HOUSEKEEPING_TICK);
    let toast_ttl = chrono::Duration::milliseconds(TOAST_TTL_MS);

    println!("{}", Message::Watching.text(lang));

    let outcome = loop {
        tokio::select! {
            Some(update) = poll_rx.recv() => {
                handle_update(&mut engine, &guard, update, privileged, lang);
            }
            Some(event) = host_rx.recv() => {
                if let Some(reason) = render_host_event(event, lang) {
                    break Some(reason);
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    guard.record_activity(ActivityKind::KeyPress);
                    match parse_input(&line) {
                        Input::Continue => {
                            if guard.continue_session() {
                                println!("{}", Message::SessionContinued.text(lang));
                            }
                        }
                        Input::Quit => guard.logout_now(),
                        Input::Refresh => refresh.notify_one(),
                        Input::List => {
                            let remaining = guard.remaining();
                            print!("{}", format_queue(engine.notifications(), remaining, lang));
                        }
                        Input::Dismiss(id) => {
                            if engine.dismiss(&id) {
                                print!("{}", format_queue(engine.notifications(), None, lang));
                            } else {
                                println!("No active notification {}", id);
                            }
                        }
                        Input::Other => {}
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    debug!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            _ = housekeeping.tick() => {
                if shutdown.load(Ordering::Relaxed) {
                    break None;
                }
                let expired = engine.expire_older_than(toast_ttl, Utc::now());
                if !expired.is_empty() {
                    debug!(count = expired.len(), "notifications expired");
                }
            }
        }
    };

    poll_task.abort();
    guard.teardown();

    match outcome {
        Some(reason) => {
            revoke(&client).await;
            auth::clear(db.as_ref())?;
            let message = if reason.session_expired() {
                Message::SessionExpired
            } else {
                Message::LoggedOut
            };
            println!("{}", message.text(lang));
        }
        None => debug!("watch interrupted"),
    }

    Ok(())
}

fn handle_update(
    engine: &mut NotificationEngine,
    guard: &SessionGuard,
    update: PollUpdate,
    privileged: bool,
    lang: Language,
) {
    match update {
        PollUpdate::Tickets(tickets) => {
            for event in engine.process(&tickets, privileged) {
                println!("{}", format_event(&event));
            }
        }
        PollUpdate::Failed { first, .. } => {
            if first {
                println!("{}", Message::LoadFailed.text(lang));
            }
        }
        PollUpdate::Unauthorized => guard.expire_now(),
    }
}

/// Draws a session event. Returns the reason when the session ended.
fn render_host_event(event: HostEvent, lang: Language) -> Option<LogoutReason> {
    match event {
        HostEvent::ShowWarning(remaining) => {
            println!(
                "\n{} ({})",
                Message::SessionWarningTitle.text(lang),
                format_remaining(remaining)
            );
            println!("{}", Message::SessionWarningHint.text(lang));
        }
        HostEvent::Tick(remaining) => {
            print!("\r{}", format_remaining(remaining));
            let _ = io::stdout().flush();
        }
        HostEvent::HideWarning => println!(),
        HostEvent::Logout(reason) => return Some(reason),
    }
    None
}

use anyhow::{bail, Result};
use clap::Args;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::models::Language;
use crate::session::TimeoutConfig;

pub const DATA_DIR_NAME: &str = ".ticketwatch";
pub const DB_FILE_NAME: &str = "ticketwatch.db";
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const DEFAULT_INACTIVITY_MINUTES: f64 = 40.0;
const DEFAULT_WARNING_MINUTES: f64 = 2.0;
const DEFAULT_POLL_SECS: f64 = 2.0;

/// Options shared by every subcommand. Durations are taken as raw text and
/// sanitised, so a bad value falls back to its default instead of failing.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Base URL of the ticket API
    #[arg(long, global = true, env = "TICKETWATCH_API_URL")]
    pub api_url: Option<String>,

    /// Directory holding the local store (default: nearest .ticketwatch)
    #[arg(long, global = true, env = "TICKETWATCH_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Minutes of inactivity before the session expires
    #[arg(long, global = true, env = "TICKETWATCH_INACTIVITY_TIMEOUT_MINUTES")]
    pub inactivity_timeout_minutes: Option<String>,

    /// Minutes before expiry at which the warning appears
    #[arg(long, global = true, env = "TICKETWATCH_WARNING_TIME_MINUTES")]
    pub warning_time_minutes: Option<String>,

    /// Seconds between ticket list refreshes
    #[arg(long, global = true, env = "TICKETWATCH_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<String>,

    /// Interface language (es, en)
    #[arg(long, global = true, env = "TICKETWATCH_LANG")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub data_dir: Option<PathBuf>,
    pub timeout: TimeoutConfig,
    pub poll_interval: Duration,
    pub lang: Language,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Self {
        let inactivity = positive_or_default(
            "inactivity timeout",
            args.inactivity_timeout_minutes.as_deref(),
            DEFAULT_INACTIVITY_MINUTES,
        );
        let warning = positive_or_default(
            "warning time",
            args.warning_time_minutes.as_deref(),
            DEFAULT_WARNING_MINUTES,
        );
        let poll = positive_or_default(
            "poll interval",
            args.poll_interval_secs.as_deref(),
            DEFAULT_POLL_SECS,
        );

        Settings {
            api_url: args
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            data_dir: args.data_dir.clone(),
            timeout: TimeoutConfig {
                inactivity_timeout: seconds(inactivity * 60.0, DEFAULT_INACTIVITY_MINUTES * 60.0),
                warning_lead: seconds(warning * 60.0, DEFAULT_WARNING_MINUTES * 60.0),
            },
            poll_interval: seconds(poll, DEFAULT_POLL_SECS),
            lang: args
                .lang
                .as_deref()
                .map(Language::from_tag)
                .unwrap_or_default(),
        }
    }

    /// The configured data directory, or the nearest `.ticketwatch` above
    /// the current directory.
    pub fn find_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        find_data_dir_from(&env::current_dir()?)
    }

    /// Like [`Settings::find_data_dir`], falling back to `./.ticketwatch`.
    pub fn data_dir_or_default(&self) -> Result<PathBuf> {
        match self.find_data_dir() {
            Ok(dir) => Ok(dir),
            Err(_) => Ok(env::current_dir()?.join(DATA_DIR_NAME)),
        }
    }
}

pub fn find_data_dir_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(DATA_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            bail!(
                "No {} directory found (or any parent). Run 'ticketwatch login' first.",
                DATA_DIR_NAME
            );
        }
    }
}

/// Parses `raw` as a positive finite number, falling back to `default`.
pub fn positive_or_default(name: &str, raw: Option<&str>, default: f64) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n,
        _ => {
            warn!(setting = name, value = raw, default, "invalid duration, using default");
            default
        }
    }
}

/// Values too large for a `Duration` use the default.
fn seconds(secs: f64, default_secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| Duration::from_secs_f64(default_secs))
}

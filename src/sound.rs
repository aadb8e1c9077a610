use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Audible cue played once per notification cycle.
pub trait SoundCue: Send + Sync {
    fn play(&self);
}

/// Rings the terminal bell on stderr.
pub struct TerminalBell;

impl SoundCue for TerminalBell {
    fn play(&self) {
        let mut stderr = io::stderr().lock();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!(error = %e, "could not play notification sound");
        }
    }
}

pub struct Silent;

impl SoundCue for Silent {
    fn play(&self) {}
}

/// Counts plays instead of making noise.
#[cfg(test)]
#[derive(Default)]
pub struct CountingCue {
    plays: AtomicUsize,
}

#[cfg(test)]
impl CountingCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SoundCue for CountingCue {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }
}

#![no_main]

//! Fuzz target for the stored notification state.
//!
//! Whatever bytes end up under the state key, loading must fall back to an
//! empty state instead of panicking, and a decoded state must survive being
//! written back.

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use ticketwatch::db::{KeyValueStore, MemoryStore};
use ticketwatch::state::{NotificationState, STATE_KEY};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let now = match Utc.timestamp_millis_opt(1_700_000_000_000).single() {
        Some(now) => now,
        None => return,
    };

    let store = MemoryStore::new();
    if store.set(STATE_KEY, &raw).is_err() {
        return;
    }

    let mut state = NotificationState::load(&store, now);
    if NotificationState::decode(&raw).is_none() {
        assert!(state.snapshots.is_empty());
    }

    state.reset_if_stale(now);
    state.save(&store);
    let reloaded = NotificationState::load(&store, now);
    assert_eq!(reloaded, state);
});

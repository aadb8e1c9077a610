//! Durable dedup state for ticket notifications.
//!
//! Stored as one JSON document under [`STATE_KEY`]:
//!
//! ```json
//! { "snapshots": { "5": { "status": "resuelto", "priority": "media",
//!                         "createdSeen": true, "timestamp": 1714557600000 } },
//!   "lastUpdate": 1714557600000 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::db::KeyValueStore;
use crate::models::TicketRecord;

pub const STATE_KEY: &str = "ticket_last_known_state";

/// Snapshots older than this are discarded wholesale on load.
pub const STALE_AFTER_MS: i64 = 60 * 60 * 1000;

/// Last status/priority the viewer has been told about for one ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSnapshot {
    pub status: String,
    pub priority: String,
    #[serde(default)]
    pub created_seen: bool,
    #[serde(default)]
    pub timestamp: i64,
}

impl TicketSnapshot {
    pub fn of(ticket: &TicketRecord, created_seen: bool, now: DateTime<Utc>) -> Self {
        TicketSnapshot {
            status: ticket.status.clone(),
            priority: ticket.priority.clone(),
            created_seen,
            timestamp: now.timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    #[serde(default)]
    pub snapshots: BTreeMap<i64, TicketSnapshot>,
    pub last_update: i64,
}

impl NotificationState {
    pub fn empty(now: DateTime<Utc>) -> Self {
        NotificationState {
            snapshots: BTreeMap::new(),
            last_update: now.timestamp_millis(),
        }
    }

    /// Reads the stored state. Missing, unreadable or corrupt state yields an
    /// empty map stamped with `now`.
    pub fn load(store: &dyn KeyValueStore, now: DateTime<Utc>) -> Self {
        let raw = match store.get(STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::empty(now),
            Err(e) => {
                warn!(error = %e, "could not read notification state, starting empty");
                return Self::empty(now);
            }
        };

        match Self::decode(&raw) {
            Some(state) => state,
            None => {
                warn!("stored notification state is corrupt, starting empty");
                Self::empty(now)
            }
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// Write failures are logged and otherwise ignored; the engine keeps
    /// working from memory.
    pub fn save(&self, store: &dyn KeyValueStore) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not encode notification state");
                return;
            }
        };
        if let Err(e) = store.set(STATE_KEY, &json) {
            warn!(error = %e, "could not persist notification state");
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.last_update > STALE_AFTER_MS
    }

    /// Drops every snapshot when the state has not been touched for an hour.
    /// Returns true when a reset happened.
    pub fn reset_if_stale(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_stale(now) {
            return false;
        }
        debug!(
            snapshots = self.snapshots.len(),
            last_update = self.last_update,
            "notification state is stale, resetting"
        );
        self.snapshots.clear();
        self.last_update = now.timestamp_millis();
        true
    }

    /// Advances `last_update`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = self.last_update.max(now.timestamp_millis());
    }

    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_update)
    }
}

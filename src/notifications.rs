//! Change detection over successive ticket lists.
//!
//! Every fetched list is compared against the previous list and against the
//! durable snapshots in [`NotificationState`]. A change is announced once per
//! (ticket, field, new value) transition; the durable snapshot decides whether
//! the viewer has already been told, so a restart does not repeat alerts.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::KeyValueStore;
use crate::models::{Language, Priority, Status, TicketRecord};
use crate::sound::SoundCue;
use crate::state::{NotificationState, TicketSnapshot};

/// How long a toast stays on screen unless dismissed earlier.
pub const TOAST_TTL_MS: i64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    StatusChanged,
    PriorityChanged,
}

impl EventKind {
    fn tag(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::StatusChanged => "status",
            EventKind::PriorityChanged => "priority",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            EventKind::Created => Severity::Success,
            EventKind::StatusChanged => Severity::Info,
            EventKind::PriorityChanged => Severity::Warning,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    /// Unique per event; used as the dismissal key.
    pub id: String,
    pub ticket_id: i64,
    pub kind: EventKind,
    pub message: String,
    pub previous_value: Option<String>,
    pub new_value: String,
    pub created_at: DateTime<Utc>,
}

pub struct NotificationEngine {
    store: Arc<dyn KeyValueStore>,
    cue: Arc<dyn SoundCue>,
    lang: Language,
    state: NotificationState,
    /// `None` until the baseline cycle has run.
    previous: Option<Vec<TicketRecord>>,
    queue: Vec<NotificationEvent>,
}

impl NotificationEngine {
    pub fn open(store: Arc<dyn KeyValueStore>, cue: Arc<dyn SoundCue>, lang: Language) -> Self {
        Self::open_at(store, cue, lang, Utc::now())
    }

    /// Loads durable state and applies the staleness rule before any diff runs.
    pub fn open_at(
        store: Arc<dyn KeyValueStore>,
        cue: Arc<dyn SoundCue>,
        lang: Language,
        now: DateTime<Utc>,
    ) -> Self {
        let mut state = NotificationState::load(store.as_ref(), now);
        if state.reset_if_stale(now) {
            info!("discarded stale ticket snapshots");
            state.save(store.as_ref());
        }

        NotificationEngine {
            store,
            cue,
            lang,
            state,
            previous: None,
            queue: Vec::new(),
        }
    }

    pub fn process(
        &mut self,
        tickets: &[TicketRecord],
        privileged: bool,
    ) -> Vec<NotificationEvent> {
        self.process_at(tickets, privileged, Utc::now())
    }

    /// Runs one diff pass and returns the events it produced. The same events
    /// are appended to the active queue.
    pub fn process_at(
        &mut self,
        tickets: &[TicketRecord],
        privileged: bool,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        // An empty response means "no data yet", not "everything was deleted".
        if tickets.is_empty() {
            debug!("empty ticket list, keeping previous tracking");
            return Vec::new();
        }

        let Some(previous) = self.previous.as_ref() else {
            self.baseline(tickets, now);
            return Vec::new();
        };

        let lang = self.lang;
        let prev_by_id: HashMap<i64, &TicketRecord> = previous.iter().map(|t| (t.id, t)).collect();
        let snapshots = &mut self.state.snapshots;
        let mut events = Vec::new();
        let mut dirty = false;

        for ticket in tickets {
            let Some(prev) = prev_by_id.get(&ticket.id) else {
                if snapshots.contains_key(&ticket.id) {
                    continue;
                }
                snapshots.insert(ticket.id, TicketSnapshot::of(ticket, privileged, now));
                dirty = true;
                if privileged {
                    events.push(build_event(ticket, EventKind::Created, None, now, lang));
                }
                continue;
            };

            let snapshot = snapshots.entry(ticket.id).or_insert_with(|| {
                dirty = true;
                TicketSnapshot::of(prev, false, now)
            });

            if ticket.status != snapshot.status {
                let before = if prev.status == snapshot.status {
                    prev.status_text(lang)
                } else {
                    Status::from_code(&snapshot.status).display(lang).to_string()
                };
                events.push(build_event(
                    ticket,
                    EventKind::StatusChanged,
                    Some(before),
                    now,
                    lang,
                ));
                snapshot.status = ticket.status.clone();
                snapshot.timestamp = now.timestamp_millis();
                dirty = true;
            }

            if ticket.priority != snapshot.priority {
                let before = if prev.priority == snapshot.priority {
                    prev.priority_text(lang)
                } else {
                    Priority::from_code(&snapshot.priority).display(lang).to_string()
                };
                events.push(build_event(
                    ticket,
                    EventKind::PriorityChanged,
                    Some(before),
                    now,
                    lang,
                ));
                snapshot.priority = ticket.priority.clone();
                snapshot.timestamp = now.timestamp_millis();
                dirty = true;
            }
        }

        if !events.is_empty() {
            debug!(count = events.len(), "ticket changes detected");
            self.cue.play();
            self.queue.extend(events.iter().cloned());
            self.state.touch(now);
        }
        if dirty {
            self.state.save(self.store.as_ref());
        }

        self.previous = Some(tickets.to_vec());
        events
    }

    fn baseline(&mut self, tickets: &[TicketRecord], now: DateTime<Utc>) {
        let mut added = 0;
        for ticket in tickets {
            self.state
                .snapshots
                .entry(ticket.id)
                .or_insert_with(|| {
                    added += 1;
                    TicketSnapshot::of(ticket, true, now)
                });
        }
        debug!(tickets = tickets.len(), added, "baseline ticket list recorded");
        self.state.save(self.store.as_ref());
        self.previous = Some(tickets.to_vec());
    }

    /// Active events, oldest first.
    pub fn notifications(&self) -> &[NotificationEvent] {
        &self.queue
    }

    pub fn dismiss(&mut self, event_id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| e.id != event_id);
        self.queue.len() != before
    }

    /// Drops events that have been on screen longer than `ttl`.
    pub fn expire_older_than(
        &mut self,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|e| now - e.created_at >= ttl);
        self.queue = kept;
        expired
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

fn build_event(
    ticket: &TicketRecord,
    kind: EventKind,
    previous_value: Option<String>,
    now: DateTime<Utc>,
    lang: Language,
) -> NotificationEvent {
    let new_value = match kind {
        EventKind::Created => ticket.subject.clone(),
        EventKind::StatusChanged => ticket.status_text(lang),
        EventKind::PriorityChanged => ticket.priority_text(lang),
    };

    NotificationEvent {
        id: event_id(ticket.id, kind, now),
        ticket_id: ticket.id,
        kind,
        message: render_message(ticket, kind, &new_value, lang),
        previous_value,
        new_value,
        created_at: now,
    }
}

fn event_id(ticket_id: i64, kind: EventKind, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}-{:08x}",
        ticket_id,
        kind.tag(),
        now.timestamp_millis(),
        rand::random::<u32>()
    )
}

fn render_message(
    ticket: &TicketRecord,
    kind: EventKind,
    new_value: &str,
    lang: Language,
) -> String {
    match (kind, lang) {
        (EventKind::Created, Language::Es) => {
            format!("Nuevo ticket. {}: \"{}\"", ticket.creator_name, ticket.subject)
        }
        (EventKind::Created, Language::En) => {
            format!("New ticket. {}: \"{}\"", ticket.creator_name, ticket.subject)
        }
        (EventKind::StatusChanged, Language::Es) => {
            format!("Ticket \"{}\": Estado cambiado a \"{}\"", ticket.subject, new_value)
        }
        (EventKind::StatusChanged, Language::En) => {
            format!("Ticket \"{}\": status changed to \"{}\"", ticket.subject, new_value)
        }
        (EventKind::PriorityChanged, Language::Es) => {
            format!("Ticket \"{}\": Prioridad cambiada a \"{}\"", ticket.subject, new_value)
        }
        (EventKind::PriorityChanged, Language::En) => {
            format!("Ticket \"{}\": priority changed to \"{}\"", ticket.subject, new_value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryStore};
    use crate::sound::CountingCue;
    use crate::state::STATE_KEY;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn ticket(id: i64, status: &str, priority: &str) -> TicketRecord {
        let status_display = Status::from_code(status).display(Language::Es).to_string();
        let priority_display = Priority::from_code(priority).display(Language::Es).to_string();
        TicketRecord {
            id,
            status: status.to_string(),
            status_display,
            priority: priority.to_string(),
            priority_display,
            subject: format!("Ticket {}", id),
            creator_name: "Ana".to_string(),
            department_name: None,
            reason_name: None,
            content: None,
            created_at: None,
            closed_at: None,
        }
    }

    fn engine_with(
        store: Arc<dyn KeyValueStore>,
        now: DateTime<Utc>,
    ) -> (NotificationEngine, Arc<CountingCue>) {
        let cue = Arc::new(CountingCue::default());
        let engine = NotificationEngine::open_at(store, cue.clone(), Language::Es, now);
        (engine, cue)
    }

    fn setup() -> (NotificationEngine, Arc<CountingCue>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (engine, cue) = engine_with(store.clone(), t0());
        (engine, cue, store)
    }

    fn stored_state(store: &MemoryStore) -> NotificationState {
        NotificationState::decode(&store.get(STATE_KEY).unwrap().unwrap()).unwrap()
    }

    // ==================== Unit Tests ====================

    #[test]
    fn test_baseline_emits_nothing_and_persists() {
        let (mut engine, cue, store) = setup();
        let events = engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "resuelto", "alta")],
            true,
            at(0),
        );

        assert!(events.is_empty());
        assert!(engine.notifications().is_empty());
        assert_eq!(cue.plays(), 0);
        assert!(engine.has_baseline());

        let state = stored_state(&store);
        assert_eq!(state.snapshots.len(), 2);
        assert!(state.snapshots[&1].created_seen);
        assert_eq!(state.snapshots[&2].status, "resuelto");
    }

    #[test]
    fn test_same_list_twice_is_silent() {
        let (mut engine, cue, _store) = setup();
        let list = vec![ticket(1, "abierto", "media"), ticket(2, "en_proceso", "baja")];
        engine.process_at(&list, true, at(0));
        let events = engine.process_at(&list, true, at(2));

        assert!(events.is_empty());
        assert_eq!(cue.plays(), 0);
    }

    #[test]
    fn test_back_and_forth_transition_alerts_twice() {
        let (mut engine, _cue, _store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], false, at(0));

        let first = engine.process_at(&[ticket(1, "en_proceso", "media")], false, at(2));
        let repeat = engine.process_at(&[ticket(1, "en_proceso", "media")], false, at(4));
        let second = engine.process_at(&[ticket(1, "abierto", "media")], false, at(6));

        assert_eq!(first.len(), 1);
        assert!(repeat.is_empty());
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);

        assert_eq!(first[0].kind, EventKind::StatusChanged);
        assert_eq!(first[0].previous_value.as_deref(), Some("Abierto"));
        assert_eq!(first[0].new_value, "En Proceso");
        assert_eq!(first[0].message, "Ticket \"Ticket 1\": Estado cambiado a \"En Proceso\"");
        assert_eq!(second[0].previous_value.as_deref(), Some("En Proceso"));
        assert_eq!(engine.notifications().len(), 2);
    }

    #[test]
    fn test_no_realert_after_restart() {
        let store = Arc::new(MemoryStore::new());
        let mut state = NotificationState::empty(t0());
        state.snapshots.insert(5, TicketSnapshot::of(&ticket(5, "resuelto", "media"), true, t0()));
        state.save(store.as_ref());

        let (mut engine, cue) = engine_with(store.clone(), at(60));
        let list = vec![ticket(5, "resuelto", "media")];
        assert!(engine.process_at(&list, true, at(60)).is_empty());
        assert!(engine.process_at(&list, true, at(62)).is_empty());
        assert_eq!(cue.plays(), 0);
    }

    #[test]
    fn test_change_while_away_is_announced_once() {
        let store = Arc::new(MemoryStore::new());
        let mut state = NotificationState::empty(t0());
        state.snapshots.insert(5, TicketSnapshot::of(&ticket(5, "abierto", "media"), true, t0()));
        state.save(store.as_ref());

        let (mut engine, _cue) = engine_with(store.clone(), at(60));
        let list = vec![ticket(5, "resuelto", "media")];
        assert!(engine.process_at(&list, false, at(60)).is_empty());

        let events = engine.process_at(&list, false, at(62));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_value.as_deref(), Some("Abierto"));
        assert_eq!(events[0].new_value, "Resuelto");

        assert!(engine.process_at(&list, false, at(64)).is_empty());
    }

    #[test]
    fn test_stale_snapshots_are_discarded() {
        let store = Arc::new(MemoryStore::new());
        let mut state = NotificationState::empty(t0());
        state.snapshots.insert(7, TicketSnapshot::of(&ticket(7, "abierto", "media"), true, t0()));
        state.save(store.as_ref());

        let later = t0() + Duration::hours(2);
        let (mut engine, _cue) = engine_with(store.clone(), later);
        assert!(engine.state().snapshots.is_empty());
        assert!(stored_state(&store).snapshots.is_empty());

        let list = vec![ticket(7, "en_proceso", "media")];
        assert!(engine.process_at(&list, true, later).is_empty());
        assert_eq!(engine.state().snapshots[&7].status, "en_proceso");
        assert!(engine
            .process_at(&list, true, later + Duration::seconds(2))
            .is_empty());

        let events = engine.process_at(
            &[ticket(7, "abierto", "media")],
            true,
            later + Duration::seconds(4),
        );
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_new_ticket_for_privileged_viewer() {
        let (mut engine, cue, store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));

        let events = engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "abierto", "alta")],
            true,
            at(2),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Created);
        assert_eq!(events[0].ticket_id, 2);
        assert_eq!(events[0].message, "Nuevo ticket. Ana: \"Ticket 2\"");
        assert_eq!(events[0].kind.severity(), Severity::Success);
        assert_eq!(cue.plays(), 1);
        assert!(stored_state(&store).snapshots.contains_key(&2));
    }

    #[test]
    fn test_new_ticket_for_regular_viewer_is_silent_but_recorded() {
        let (mut engine, cue, store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], false, at(0));

        let events = engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "abierto", "alta")],
            false,
            at(2),
        );
        assert!(events.is_empty());
        assert_eq!(cue.plays(), 0);

        let state = stored_state(&store);
        assert!(state.snapshots.contains_key(&2));
        assert!(!state.snapshots[&2].created_seen);

        // becoming privileged later does not announce it
        let events = engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "abierto", "alta")],
            true,
            at(4),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_list_keeps_previous_tracking() {
        let (mut engine, _cue, _store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
        assert!(engine.process_at(&[], true, at(2)).is_empty());

        let events = engine.process_at(&[ticket(1, "en_proceso", "media")], true, at(4));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::StatusChanged);
    }

    #[test]
    fn test_empty_first_list_is_not_baseline() {
        let (mut engine, cue, _store) = setup();
        engine.process_at(&[], true, at(0));
        assert!(!engine.has_baseline());

        let events = engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "abierto", "media")],
            true,
            at(2),
        );
        assert!(events.is_empty());
        assert_eq!(cue.plays(), 0);
    }

    #[test]
    fn test_one_sound_per_cycle() {
        let (mut engine, cue, _store) = setup();
        engine.process_at(
            &[ticket(1, "abierto", "media"), ticket(2, "abierto", "media")],
            true,
            at(0),
        );

        let events = engine.process_at(
            &[ticket(1, "resuelto", "alta"), ticket(2, "en_proceso", "media")],
            true,
            at(2),
        );
        assert_eq!(events.len(), 3);
        assert_eq!(cue.plays(), 1);

        let kinds: Vec<_> = events.iter().map(|e| (e.ticket_id, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, EventKind::StatusChanged),
                (1, EventKind::PriorityChanged),
                (2, EventKind::StatusChanged)
            ]
        );
    }

    #[test]
    fn test_priority_change_message() {
        let (mut engine, _cue, _store) = setup();
        engine.process_at(&[ticket(3, "abierto", "media")], false, at(0));
        let events = engine.process_at(&[ticket(3, "abierto", "urgente")], false, at(2));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::PriorityChanged);
        assert_eq!(events[0].previous_value.as_deref(), Some("Media"));
        assert_eq!(events[0].new_value, "Urgente");
        assert_eq!(events[0].message, "Ticket \"Ticket 3\": Prioridad cambiada a \"Urgente\"");
    }

    #[test]
    fn test_english_messages() {
        let store = Arc::new(MemoryStore::new());
        let cue = Arc::new(CountingCue::default());
        let mut engine = NotificationEngine::open_at(store, cue, Language::En, t0());
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));

        let mut changed = ticket(1, "resuelto", "media");
        changed.status_display.clear();
        let events = engine.process_at(&[changed, ticket(2, "abierto", "baja")], true, at(2));

        assert_eq!(events[0].message, "Ticket \"Ticket 1\": status changed to \"Resolved\"");
        assert_eq!(events[1].message, "New ticket. Ana: \"Ticket 2\"");
    }

    #[test]
    fn test_last_update_advances_on_events() {
        let (mut engine, _cue, store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
        engine.process_at(&[ticket(1, "resuelto", "media")], true, at(30));
        assert_eq!(stored_state(&store).last_update, at(30).timestamp_millis());
    }

    #[test]
    fn test_dismiss() {
        let (mut engine, _cue, _store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
        let events = engine.process_at(&[ticket(1, "resuelto", "alta")], true, at(2));

        assert!(engine.dismiss(&events[0].id));
        assert!(!engine.dismiss(&events[0].id));
        assert!(!engine.dismiss("unknown"));
        assert_eq!(engine.notifications(), &events[1..]);
    }

    #[test]
    fn test_toasts_expire() {
        let (mut engine, _cue, _store) = setup();
        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
        engine.process_at(&[ticket(1, "resuelto", "media")], true, at(2));
        engine.process_at(&[ticket(1, "resuelto", "alta")], true, at(5));

        let ttl = Duration::milliseconds(TOAST_TTL_MS);
        let expired = engine.expire_older_than(ttl, at(6));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].kind, EventKind::StatusChanged);
        assert_eq!(engine.notifications().len(), 1);
        assert_eq!(engine.notifications()[0].kind, EventKind::PriorityChanged);
    }

    #[test]
    fn test_corrupt_store_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        store.set(STATE_KEY, "][").unwrap();
        let (mut engine, _cue) = engine_with(store.clone(), t0());

        engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
        let events = engine.process_at(&[ticket(1, "resuelto", "media")], true, at(2));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_state_survives_sqlite_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store: Arc<dyn KeyValueStore> = Arc::new(Database::open(&path).unwrap());
            let (mut engine, _cue) = engine_with(store, t0());
            engine.process_at(&[ticket(1, "abierto", "media")], true, at(0));
            engine.process_at(&[ticket(1, "resuelto", "media")], true, at(2));
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(Database::open(&path).unwrap());
        let (mut engine, cue) = engine_with(store, at(10));
        let list = vec![ticket(1, "resuelto", "media")];
        assert!(engine.process_at(&list, true, at(10)).is_empty());
        assert!(engine.process_at(&list, true, at(12)).is_empty());
        assert_eq!(cue.plays(), 0);
    }

    // ==================== Property-Based Tests ====================

    proptest! {
        #[test]
        fn prop_one_event_per_transition(
            statuses in proptest::collection::vec(
                prop_oneof!["abierto", "en_proceso", "resuelto"],
                1..30,
            )
        ) {
            let (mut engine, _cue, _store) = setup();
            let mut expected = 0;
            let mut ids = HashSet::new();

            for (step, status) in statuses.iter().enumerate() {
                if step > 0 && statuses[step - 1] != *status {
                    expected += 1;
                }
                let events = engine.process_at(
                    &[ticket(1, status, "media")],
                    true,
                    at(step as i64 * 2),
                );
                for event in events {
                    prop_assert!(ids.insert(event.id));
                }
            }

            prop_assert_eq!(ids.len(), expected);
        }

        #[test]
        fn prop_repeated_list_is_silent(
            codes in proptest::collection::vec(
                (
                    prop_oneof!["abierto", "en_proceso", "resuelto"],
                    prop_oneof!["baja", "media", "alta", "urgente"],
                ),
                1..10,
            ),
            repeats in 1usize..5
        ) {
            let (mut engine, cue, _store) = setup();
            let list: Vec<_> = codes
                .iter()
                .enumerate()
                .map(|(i, (s, p))| ticket(i as i64, s, p))
                .collect();

            for step in 0..=repeats {
                let events = engine.process_at(&list, true, at(step as i64));
                prop_assert!(events.is_empty());
            }
            prop_assert_eq!(cue.plays(), 0);
        }
    }
}

#![no_main]

//! Fuzz target for the notification engine.
//!
//! Feeds arbitrary sequences of ticket lists and checks that events only
//! name tickets in the current list and that a list seen twice in a row
//! stops producing events. A ticket that reappears with a changed value is
//! announced on the cycle after it reappears, so the check runs on the third
//! identical cycle.

use arbitrary::Arbitrary;
use chrono::{Duration, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use ticketwatch::db::MemoryStore;
use ticketwatch::models::{Language, TicketRecord};
use ticketwatch::notifications::{EventKind, NotificationEngine};
use ticketwatch::sound::Silent;

const STATUSES: [&str; 4] = ["abierto", "en_proceso", "resuelto", "archivado"];
const PRIORITIES: [&str; 5] = ["baja", "media", "alta", "urgente", ""];

#[derive(Arbitrary, Debug)]
struct FuzzTicket {
    id: u8,
    status: u8,
    priority: u8,
    subject: String,
}

#[derive(Arbitrary, Debug)]
struct EngineInput {
    privileged: bool,
    spanish: bool,
    /// Milliseconds between cycles
    gaps: Vec<u32>,
    cycles: Vec<Vec<FuzzTicket>>,
}

fn record(ticket: &FuzzTicket) -> TicketRecord {
    TicketRecord {
        id: i64::from(ticket.id % 16),
        status: STATUSES[usize::from(ticket.status) % STATUSES.len()].to_string(),
        status_display: String::new(),
        priority: PRIORITIES[usize::from(ticket.priority) % PRIORITIES.len()].to_string(),
        priority_display: String::new(),
        subject: ticket.subject.clone(),
        creator_name: "fuzz".to_string(),
        department_name: None,
        reason_name: None,
        content: None,
        created_at: None,
        closed_at: None,
    }
}

fuzz_target!(|input: EngineInput| {
    let mut now = match Utc.timestamp_millis_opt(1_700_000_000_000).single() {
        Some(now) => now,
        None => return,
    };
    let lang = if input.spanish { Language::Es } else { Language::En };
    let store = Arc::new(MemoryStore::new());
    let mut engine = NotificationEngine::open_at(store, Arc::new(Silent), lang, now);

    for (i, cycle) in input.cycles.iter().take(32).enumerate() {
        let mut tickets: Vec<TicketRecord> = cycle.iter().take(32).map(record).collect();
        // Ticket ids are unique within one response.
        tickets.sort_by_key(|t| t.id);
        tickets.dedup_by_key(|t| t.id);

        let gap = input.gaps.get(i).copied().unwrap_or(2000);
        now += Duration::milliseconds(i64::from(gap));

        let events = engine.process_at(&tickets, input.privileged, now);
        for event in &events {
            assert!(tickets.iter().any(|t| t.id == event.ticket_id));
        }

        let second = engine.process_at(&tickets, input.privileged, now);
        assert!(second.iter().all(|e| e.kind != EventKind::Created));

        let third = engine.process_at(&tickets, input.privileged, now);
        assert!(third.is_empty(), "repeated list produced {:?}", third);
    }
});

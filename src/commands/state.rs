use anyhow::Result;
use chrono::Utc;

use ticketwatch::db::KeyValueStore;
use ticketwatch::state::{NotificationState, STATE_KEY};

pub fn show(store: &dyn KeyValueStore) -> Result<()> {
    let state = NotificationState::load(store, Utc::now());
    print!("{}", render(&state, Utc::now()));
    Ok(())
}

pub fn reset(store: &dyn KeyValueStore) -> Result<()> {
    if store.remove(STATE_KEY)? {
        println!("Notification state cleared.");
    } else {
        println!("No notification state stored.");
    }
    Ok(())
}

fn render(state: &NotificationState, now: chrono::DateTime<Utc>) -> String {
    let mut out = String::new();
    if let Some(at) = state.last_update_at() {
        out.push_str(&format!("Last update: {}", at.format("%Y-%m-%d %H:%M:%S")));
        if state.is_stale(now) {
            out.push_str(" (stale)");
        }
        out.push('\n');
    }

    if state.snapshots.is_empty() {
        out.push_str("No tracked tickets.\n");
        return out;
    }

    for (id, snapshot) in &state.snapshots {
        out.push_str(&format!(
            "#{:<4} {:12} {:8} {}\n",
            id,
            snapshot.status,
            snapshot.priority,
            if snapshot.created_seen { "seen" } else { "-" }
        ));
    }
    out
}

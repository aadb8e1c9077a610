use anyhow::{bail, Context, Result};

use super::require_login;
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::messages::Message;
use ticketwatch::models::{Language, Priority, Status, UserProfile};

pub async fn run(
    store: &dyn KeyValueStore,
    settings: &Settings,
    id: i64,
    status: Option<&str>,
    priority: Option<&str>,
) -> Result<()> {
    if status.is_none() && priority.is_none() {
        bail!("Nothing to update. Pass --status and/or --priority.");
    }
    let status = status.map(parse_status).transpose()?;
    let priority = priority.map(parse_priority).transpose()?;

    let lang = settings.lang;
    let (credentials, client) = require_login(store, settings)?;
    ensure_privileged(&credentials.user, lang)?;

    if let Some(status) = status {
        let ticket = client
            .update_status(id, status.code())
            .await
            .with_context(|| format!("Failed to update status of ticket #{}", id))?;
        println!("Ticket #{}: {}", ticket.id, ticket.status_text(lang));
    }

    if let Some(priority) = priority {
        let ticket = client
            .update_priority(id, priority.code())
            .await
            .with_context(|| format!("Failed to update priority of ticket #{}", id))?;
        println!("Ticket #{}: {}", ticket.id, ticket.priority_text(lang));
    }

    Ok(())
}

fn ensure_privileged(user: &UserProfile, lang: Language) -> Result<()> {
    if !user.is_privileged() {
        bail!("{}", Message::AdminOnly.text(lang));
    }
    Ok(())
}

fn parse_status(code: &str) -> Result<Status> {
    match Status::from_code(code) {
        Status::Other(_) => {
            let known: Vec<&str> = Status::KNOWN.iter().map(|s| s.code()).collect();
            bail!("Unknown status '{}'. Expected one of: {}", code, known.join(", "))
        }
        status => Ok(status),
    }
}

fn parse_priority(code: &str) -> Result<Priority> {
    match Priority::from_code(code) {
        Priority::Other(_) => {
            let known: Vec<&str> = Priority::KNOWN.iter().map(|p| p.code()).collect();
            bail!("Unknown priority '{}'. Expected one of: {}", code, known.join(", "))
        }
        priority => Ok(priority),
    }
}

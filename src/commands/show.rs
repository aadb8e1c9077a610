use anyhow::{bail, Context, Result};

use super::require_login;
use ticketwatch::api::ApiError;
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::models::{Language, TicketRecord};

pub async fn run(store: &dyn KeyValueStore, settings: &Settings, id: i64) -> Result<()> {
    let (_, client) = require_login(store, settings)?;
    let ticket = match client.ticket(id).await {
        Ok(t) => t,
        Err(ApiError::Http { status: 404, .. }) => bail!("Ticket #{} not found", id),
        Err(e) => return Err(e).context("Failed to load ticket"),
    };

    print!("{}", render(&ticket, settings.lang));
    Ok(())
}

fn render(ticket: &TicketRecord, lang: Language) -> String {
    let mut out = format!("Ticket #{}: {}\n", ticket.id, ticket.subject);
    out.push_str(&format!("Status: {}\n", ticket.status_text(lang)));
    out.push_str(&format!("Priority: {}\n", ticket.priority_text(lang)));
    out.push_str(&format!("Created by: {}\n", ticket.creator_name));
    if let Some(department) = &ticket.department_name {
        out.push_str(&format!("Department: {}\n", department));
    }
    if let Some(reason) = &ticket.reason_name {
        out.push_str(&format!("Reason: {}\n", reason));
    }
    if let Some(created) = ticket.created_at {
        out.push_str(&format!("Created: {}\n", created.format("%Y-%m-%d %H:%M:%S")));
    }
    if let Some(closed) = ticket.closed_at {
        out.push_str(&format!("Closed: {}\n", closed.format("%Y-%m-%d %H:%M:%S")));
    }

    if let Some(content) = &ticket.content {
        if !content.is_empty() {
            out.push_str("\nContent:\n");
            for line in content.lines() {
                out.push_str(&format!("  {}\n", line));
            }
        }
    }
    out
}

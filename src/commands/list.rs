use anyhow::{Context, Result};

use super::{require_login, truncate};
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::messages::Message;
use ticketwatch::models::{Language, TicketRecord, TicketStats};

pub async fn run(store: &dyn KeyValueStore, settings: &Settings, status: &str) -> Result<()> {
    let lang = settings.lang;
    let (_, client) = require_login(store, settings)?;
    let tickets = client.tickets().await.context(Message::LoadFailed.text(lang))?;

    println!("{}", format_stats(&TicketStats::from_tickets(&tickets), lang));

    let shown = filter_by_status(&tickets, status);
    if shown.is_empty() {
        println!("{}", Message::NoTickets.text(lang));
        return Ok(());
    }

    for ticket in shown {
        println!("{}", format_line(ticket, lang));
    }

    Ok(())
}

fn filter_by_status<'a>(tickets: &'a [TicketRecord], status: &str) -> Vec<&'a TicketRecord> {
    if status == "all" {
        return tickets.iter().collect();
    }
    tickets.iter().filter(|t| t.status == status).collect()
}

fn format_stats(stats: &TicketStats, lang: Language) -> String {
    match lang {
        Language::Es => format!(
            "Total: {}  Abiertos: {}  En proceso: {}  Resueltos: {}",
            stats.total, stats.open, stats.in_progress, stats.resolved
        ),
        Language::En => format!(
            "Total: {}  Open: {}  In progress: {}  Resolved: {}",
            stats.total, stats.open, stats.in_progress, stats.resolved
        ),
    }
}

fn format_line(ticket: &TicketRecord, lang: Language) -> String {
    let status_display = format!("[{}]", ticket.status_text(lang));
    let date = ticket
        .created_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "#{:<4} {:13} {:<40} {:8} {}",
        ticket.id,
        status_display,
        truncate(&ticket.subject, 40),
        ticket.priority_text(lang),
        date
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket(id: i64, status: &str, subject: &str) -> TicketRecord {
        serde_json::from_value(json!({
            "id": id,
            "estado": status,
            "prioridad": "media",
            "asunto": subject,
            "usuario_nombre": "Ana",
            "fecha_creacion": "2024-03-05T10:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn test_filter_by_status() {
        let tickets = vec![
            ticket(1, "abierto", "a"),
            ticket(2, "resuelto", "b"),
            ticket(3, "abierto", "c"),
        ];
        assert_eq!(filter_by_status(&tickets, "all").len(), 3);
        let open: Vec<i64> = filter_by_status(&tickets, "abierto").iter().map(|t| t.id).collect();
        assert_eq!(open, vec![1, 3]);
        assert!(filter_by_status(&tickets, "en_proceso").is_empty());
    }

    #[test]
    fn test_format_stats() {
        let tickets = vec![ticket(1, "abierto", "a"), ticket(2, "en_proceso", "b")];
        let stats = TicketStats::from_tickets(&tickets);
        assert_eq!(
            format_stats(&stats, Language::En),
            "Total: 2  Open: 1  In progress: 1  Resolved: 0"
        );
        assert!(format_stats(&stats, Language::Es).starts_with("Total: 2  Abiertos: 1"));
    }

    #[test]
    fn test_format_line() {
        let line = format_line(&ticket(7, "abierto", "Printer jam"), Language::En);
        assert!(line.starts_with("#7    [Open]"));
        assert!(line.contains("Printer jam"));
        assert!(line.contains("Medium"));
        assert!(line.ends_with("2024-03-05"));
    }
}

use anyhow::{bail, Context, Result};

use super::require_login;
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::messages::Message;
use ticketwatch::models::{Department, Language, NewTicket, Priority, Reason, UserProfile};

pub struct NewTicketArgs<'a> {
    pub subject: &'a str,
    pub content: &'a str,
    pub department: &'a str,
    pub reason: Option<&'a str>,
    pub priority: &'a str,
}

pub async fn run(
    store: &dyn KeyValueStore,
    settings: &Settings,
    args: NewTicketArgs<'_>,
) -> Result<()> {
    let subject = args.subject.trim();
    let content = args.content.trim();
    if subject.is_empty() || content.is_empty() {
        bail!("Subject and content cannot be empty.");
    }
    let priority = parse_priority(args.priority)?;

    let lang = settings.lang;
    let (credentials, client) = require_login(store, settings)?;
    ensure_can_create(&credentials.user, lang)?;

    let departments = client
        .departments()
        .await
        .context("Failed to load departments")?;
    let department = resolve_department(&departments, args.department)?;

    let reason_id = match args.reason {
        Some(wanted) => {
            let reasons = client
                .reasons(Some(department.id))
                .await
                .context("Failed to load reasons")?;
            Some(resolve_reason(&reasons, wanted, lang)?.id)
        }
        None => None,
    };

    let ticket = NewTicket {
        department_id: department.id,
        reason_id,
        subject: subject.to_string(),
        content: content.to_string(),
        priority: priority.code().to_string(),
    };
    let created = client
        .create_ticket(&ticket)
        .await
        .context("Failed to create ticket")?;

    println!(
        "Created ticket #{}: {} [{}]",
        created.id,
        created.subject,
        department.name
    );
    Ok(())
}

/// Superusers handle tickets; the server rejects their submissions.
fn ensure_can_create(user: &UserProfile, lang: Language) -> Result<()> {
    if user.is_privileged() {
        bail!("{}", Message::AdminCannotCreate.text(lang));
    }
    Ok(())
}

fn parse_priority(code: &str) -> Result<Priority> {
    match Priority::from_code(code) {
        Priority::Other(_) => {
            let known: Vec<&str> = Priority::KNOWN.iter().map(|p| p.code()).collect();
            bail!(
                "Unknown priority '{}'. Expected one of: {}",
                code,
                known.join(", ")
            )
        }
        priority => Ok(priority),
    }
}

/// Matches an active department by id or by case-insensitive name.
fn resolve_department<'a>(departments: &'a [Department], wanted: &str) -> Result<&'a Department> {
    let wanted = wanted.trim();
    let by_id = wanted.parse::<i64>().ok();
    let lowered = wanted.to_lowercase();
    let found = departments
        .iter()
        .filter(|d| d.active)
        .find(|d| Some(d.id) == by_id || d.name.to_lowercase() == lowered);
    match found {
        Some(department) => Ok(department),
        None => {
            let names: Vec<String> = departments
                .iter()
                .filter(|d| d.active)
                .map(|d| format!("{} ({})", d.name, d.id))
                .collect();
            bail!(
                "Unknown department '{}'. Available: {}",
                wanted,
                names.join(", ")
            )
        }
    }
}

/// Matches a reason by id, its Spanish name or its localized name.
fn resolve_reason<'a>(reasons: &'a [Reason], wanted: &str, lang: Language) -> Result<&'a Reason> {
    let wanted = wanted.trim();
    let by_id = wanted.parse::<i64>().ok();
    let lowered = wanted.to_lowercase();
    let found = reasons.iter().find(|r| {
        Some(r.id) == by_id
            || r.name.to_lowercase() == lowered
            || r.display_name(lang).to_lowercase() == lowered
    });
    match found {
        Some(reason) => Ok(reason),
        None => {
            let names: Vec<String> = reasons
                .iter()
                .map(|r| format!("{} ({})", r.display_name(lang), r.id))
                .collect();
            bail!("Unknown reason '{}'. Available: {}", wanted, names.join(", "))
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticket as returned by the ticket list endpoint.
///
/// Field names follow the server's wire format; only the fields the client
/// reads are declared, everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: i64,
    #[serde(rename = "estado")]
    pub status: String,
    #[serde(rename = "estado_display", default)]
    pub status_display: String,
    #[serde(rename = "prioridad")]
    pub priority: String,
    #[serde(rename = "prioridad_display", default)]
    pub priority_display: String,
    #[serde(rename = "asunto", default)]
    pub subject: String,
    #[serde(rename = "usuario_nombre", default)]
    pub creator_name: String,
    #[serde(rename = "departamento_nombre", default)]
    pub department_name: Option<String>,
    #[serde(rename = "motivo_nombre", default)]
    pub reason_name: Option<String>,
    #[serde(rename = "contenido", default)]
    pub content: Option<String>,
    #[serde(rename = "fecha_creacion", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_cierre", default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl TicketRecord {
    pub fn status(&self) -> Status {
        Status::from_code(&self.status)
    }

    pub fn priority(&self) -> Priority {
        Priority::from_code(&self.priority)
    }

    /// Display text for the status, preferring what the server sent.
    pub fn status_text(&self, lang: Language) -> String {
        if self.status_display.is_empty() {
            self.status().display(lang).to_string()
        } else {
            self.status_display.clone()
        }
    }

    pub fn priority_text(&self, lang: Language) -> String {
        if self.priority_display.is_empty() {
            self.priority().display(lang).to_string()
        } else {
            self.priority_display.clone()
        }
    }
}

/// Interface language for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Parses a locale tag such as `es`, `en-US`. Anything else falls back to Spanish.
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().to_ascii_lowercase().starts_with("en") {
            Language::En
        } else {
            Language::Es
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Other(String),
}

impl Status {
    pub const KNOWN: [Status; 3] = [Status::Open, Status::InProgress, Status::Resolved];

    pub fn from_code(code: &str) -> Self {
        match code {
            "abierto" => Status::Open,
            "en_proceso" => Status::InProgress,
            "resuelto" => Status::Resolved,
            other => Status::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Status::Open => "abierto",
            Status::InProgress => "en_proceso",
            Status::Resolved => "resuelto",
            Status::Other(code) => code,
        }
    }

    /// Unknown codes display verbatim.
    pub fn display(&self, lang: Language) -> &str {
        match (self, lang) {
            (Status::Open, Language::Es) => "Abierto",
            (Status::Open, Language::En) => "Open",
            (Status::InProgress, Language::Es) => "En Proceso",
            (Status::InProgress, Language::En) => "In Progress",
            (Status::Resolved, Language::Es) => "Resuelto",
            (Status::Resolved, Language::En) => "Resolved",
            (Status::Other(code), _) => code,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
    Other(String),
}

impl Priority {
    pub const KNOWN: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn from_code(code: &str) -> Self {
        match code {
            "baja" => Priority::Low,
            "media" => Priority::Medium,
            "alta" => Priority::High,
            "urgente" => Priority::Urgent,
            other => Priority::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Priority::Low => "baja",
            Priority::Medium => "media",
            Priority::High => "alta",
            Priority::Urgent => "urgente",
            Priority::Other(code) => code,
        }
    }

    pub fn display(&self, lang: Language) -> &str {
        match (self, lang) {
            (Priority::Low, Language::Es) => "Baja",
            (Priority::Low, Language::En) => "Low",
            (Priority::Medium, Language::Es) => "Media",
            (Priority::Medium, Language::En) => "Medium",
            (Priority::High, Language::Es) => "Alta",
            (Priority::High, Language::En) => "High",
            (Priority::Urgent, Language::Es) => "Urgente",
            (Priority::Urgent, Language::En) => "Urgent",
            (Priority::Other(code), _) => code,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superuser,
}

/// The authenticated user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(rename = "rol", default)]
    pub role: Role,
}

impl UserProfile {
    /// Only superusers receive "new ticket" notifications and may triage.
    pub fn is_privileged(&self) -> bool {
        self.role == Role::Superuser
    }

    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() {
            self.username.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name).trim().to_string()
        }
    }
}

/// Per-status counters shown above the ticket list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

impl TicketStats {
    pub fn from_tickets(tickets: &[TicketRecord]) -> Self {
        let mut stats = TicketStats {
            total: tickets.len(),
            ..Default::default()
        };
        for ticket in tickets {
            match ticket.status() {
                Status::Open => stats.open += 1,
                Status::InProgress => stats.in_progress += 1,
                Status::Resolved => stats.resolved += 1,
                Status::Other(_) => {}
            }
        }
        stats
    }
}

/// A department tickets can be addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A predefined ticket reason within one department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nombre_en", default)]
    pub name_en: Option<String>,
    #[serde(rename = "departamento")]
    pub department_id: i64,
}

impl Reason {
    /// English name when available, otherwise the Spanish one.
    pub fn display_name(&self, lang: Language) -> &str {
        match (lang, self.name_en.as_deref()) {
            (Language::En, Some(name)) if !name.is_empty() => name,
            _ => &self.name,
        }
    }
}

/// Body of a ticket creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTicket {
    #[serde(rename = "departamento")]
    pub department_id: i64,
    #[serde(rename = "motivo")]
    pub reason_id: Option<i64>,
    #[serde(rename = "asunto")]
    pub subject: String,
    #[serde(rename = "contenido")]
    pub content: String,
    #[serde(rename = "prioridad")]
    pub priority: String,
}

pub mod create;
pub mod list;
pub mod login;
pub mod logout;
pub mod set;
pub mod show;
pub mod state;
pub mod watch;

use anyhow::{bail, Result};

use ticketwatch::api::ApiClient;
use ticketwatch::auth::{self, Credentials};
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::messages::Message;

/// Stored credentials plus a client that sends them.
pub fn require_login(
    store: &dyn KeyValueStore,
    settings: &Settings,
) -> Result<(Credentials, ApiClient)> {
    let Some(credentials) = auth::load(store)? else {
        bail!("{}", Message::NotLoggedIn.text(settings.lang));
    };
    let client = ApiClient::new(&settings.api_url, Some(credentials.token.clone()));
    Ok((credentials, client))
}

pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

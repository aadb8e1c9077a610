use anyhow::Result;
use tracing::warn;

use ticketwatch::api::ApiClient;
use ticketwatch::auth;
use ticketwatch::config::Settings;
use ticketwatch::db::KeyValueStore;
use ticketwatch::messages::Message;

/// The local token is cleared even when the server call fails.
pub async fn run(store: &dyn KeyValueStore, settings: &Settings) -> Result<()> {
    if let Some(credentials) = auth::load(store)? {
        let client = ApiClient::new(&settings.api_url, Some(credentials.token));
        revoke(&client).await;
    }
    auth::clear(store)?;

    println!("{}", Message::LoggedOut.text(settings.lang));
    Ok(())
}

pub async fn revoke(client: &ApiClient) {
    if let Err(e) = client.logout().await {
        warn!(error = %e, "server logout failed, clearing local session anyway");
    }
}

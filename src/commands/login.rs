use anyhow::{Context, Result};
use std::fs;

use ticketwatch::api::ApiClient;
use ticketwatch::auth;
use ticketwatch::config::{Settings, DB_FILE_NAME};
use ticketwatch::db::Database;
use ticketwatch::messages::Message;

pub async fn run(settings: &Settings, email: &str, password: &str) -> Result<()> {
    let data_dir = settings.data_dir_or_default()?;
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let db = Database::open(&data_dir.join(DB_FILE_NAME)).context("Failed to open database")?;

    let client = ApiClient::new(&settings.api_url, None);
    let response = client.login(email, password).await.context("Login failed")?;
    auth::save(&db, &response)?;

    println!(
        "{} {} ({})",
        Message::LoggedIn.text(settings.lang),
        response.user.display_name(),
        response.user.email
    );
    Ok(())
}

use anyhow::{Context, Result};
use tracing::warn;

use crate::api::LoginResponse;
use crate::db::KeyValueStore;
use crate::models::UserProfile;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "user_data";

/// Token and profile of the logged-in viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user: UserProfile,
}

pub fn save(store: &dyn KeyValueStore, login: &LoginResponse) -> Result<()> {
    let user = serde_json::to_string(&login.user)?;
    store
        .set(TOKEN_KEY, &login.token)
        .context("Failed to store auth token")?;
    store.set(USER_KEY, &user).context("Failed to store user data")?;
    Ok(())
}

/// `None` when nobody is logged in. A corrupt profile counts as logged out.
pub fn load(store: &dyn KeyValueStore) -> Result<Option<Credentials>> {
    let Some(token) = store.get(TOKEN_KEY)? else {
        return Ok(None);
    };
    let Some(raw_user) = store.get(USER_KEY)? else {
        return Ok(None);
    };

    match serde_json::from_str::<UserProfile>(&raw_user) {
        Ok(user) => Ok(Some(Credentials { token, user })),
        Err(e) => {
            warn!(error = %e, "stored user data is corrupt");
            Ok(None)
        }
    }
}

pub fn clear(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_KEY)?;
    Ok(())
}

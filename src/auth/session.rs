use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::auth::repo::CredentialStore;
use crate::error::{AppError, AppResult};

pub const USERNAME_KEY: &str = "username";
pub const TOKEN_KEY: &str = "token";

const TOKEN_LEN: usize = 32;

fn session_fault(e: tower_sessions::session::Error) -> AppError {
    AppError::StoreUnavailable(anyhow::anyhow!("session store: {e}"))
}

pub(crate) fn new_session_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Anonymous -> Authenticated. Credentials are checked before the session is touched.
pub async fn sign_in(
    users: &dyn CredentialStore,
    session: &Session,
    username: &str,
    password: &str,
) -> AppResult<()> {
    if !users.verify_credentials(username, password).await? {
        warn!(username, "sign-in rejected");
        return Err(AppError::unauthorized("invalid username or password"));
    }
    session.cycle_id().await.map_err(session_fault)?;
    session
        .insert(USERNAME_KEY, username)
        .await
        .map_err(session_fault)?;
    session
        .insert(TOKEN_KEY, new_session_token())
        .await
        .map_err(session_fault)?;
    info!(username, "user signed in");
    Ok(())
}

/// Authenticated | Anonymous -> Anonymous. Never fails.
pub async fn sign_out(session: &Session) {
    if let Err(e) = session.flush().await {
        warn!(error = %e, "session flush failed");
    }
}

/// Username of the signed-in principal, if the session carries one.
pub async fn current_user(session: &Session) -> Option<String> {
    let username = session.get::<String>(USERNAME_KEY).await.ok().flatten()?;
    let token = session.get::<String>(TOKEN_KEY).await.ok().flatten()?;
    (!token.is_empty()).then_some(username)
}

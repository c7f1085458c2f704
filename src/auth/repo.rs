use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::auth::password::{hash_password, verify_or_reject};
use crate::auth::repo_types::User;
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.@-]{1,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn check_sign_up(username: &str, password: &str) -> AppResult<()> {
    if !is_valid_username(username) {
        return Err(AppError::validation("invalid username"));
    }
    if password.is_empty() {
        return Err(AppError::validation("password is required"));
    }
    Ok(())
}

fn hash(password: &str) -> AppResult<String> {
    hash_password(password).map_err(AppError::StoreUnavailable)
}

/// Persistence of sign-in credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Hash and persist a new user. `Conflict` if the username is taken.
    async fn sign_up(&self, username: &str, password: &str) -> AppResult<()>;

    /// False for an unknown username and for a wrong password alike.
    async fn verify_credentials(&self, username: &str, password: &str) -> AppResult<bool>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn sign_up(&self, username: &str, password: &str) -> AppResult<()> {
        check_sign_up(username, password)?;
        let password_hash = hash(password)?;
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(AppError::Conflict("username already registered".into()));
        }
        users.insert(
            username.to_string(),
            User { password_hash },
        );
        Ok(())
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> AppResult<bool> {
        let stored = self
            .users
            .read()
            .await
            .get(username)
            .map(|u| u.password_hash.clone());
        Ok(verify_or_reject(password, stored.as_deref()))
    }
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Stored credential for `username`, if any.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn sign_up(&self, username: &str, password: &str) -> AppResult<()> {
        check_sign_up(username, password)?;
        let password_hash = hash(password)?;
        let res = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .execute(&self.db)
        .await;
        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict("username already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> AppResult<bool> {
        let user = self.find_by_username(username).await?;
        Ok(verify_or_reject(
            password,
            user.as_ref().map(|u| u.password_hash.as_str()),
        ))
    }
}

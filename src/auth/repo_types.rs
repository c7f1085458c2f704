use sqlx::FromRow;

/// Stored credential, keyed by username. Only the argon2 hash of the
/// password is ever kept.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub password_hash: String, // argon2 PHC string
}

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use tower_sessions::Session;

use super::{jwt::JwtKeys, session::current_user};
use crate::error::AppError;
use crate::state::AppState;

/// Token from `Authorization`, with or without the `Bearer ` scheme.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    (!token.is_empty()).then_some(token)
}

/// Signed-in principal. Rejects with 401 before the handler runs.
#[derive(Debug)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Session cookie first
        if let Ok(session) = Session::from_request_parts(parts, state).await {
            if let Some(username) = current_user(&session).await {
                return Ok(AuthUser(username));
            }
        }

        let token = bearer_token(&parts.headers).ok_or_else(|| AppError::unauthorized("not signed in"))?;
        let claims = JwtKeys::from_ref(state).verify(token)?;
        Ok(AuthUser(claims.sub))
    }
}

use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{Credentials, MessageResponse, SignInResponse, TokenResponse},
        extractors::bearer_token,
        jwt::JwtKeys,
        session,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/signout", post(sign_out))
        .route("/refresh", post(refresh))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(creds) = payload?;
    let username = creds.username.trim();
    state.users.sign_up(username, &creds.password).await?;
    info!(username, "user signed up");
    Ok(Json(MessageResponse {
        message: "user successfully created",
    }))
}

#[instrument(skip(state, session, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> AppResult<Json<SignInResponse>> {
    let Json(creds) = payload?;
    let username = creds.username.trim();
    session::sign_in(state.users.as_ref(), &session, username, &creds.password).await?;

    let (token, exp) = JwtKeys::from_ref(&state).sign(username)?;
    Ok(Json(SignInResponse {
        message: "user signed in",
        token: TokenResponse { token, exp },
    }))
}

#[instrument(skip(session))]
pub async fn sign_out(session: Session) -> Json<MessageResponse> {
    session::sign_out(&session).await;
    Json(MessageResponse {
        message: "signed out",
    })
}

#[instrument(skip(state, headers))]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<TokenResponse>> {
    let token = bearer_token(&headers).ok_or_else(|| AppError::unauthorized("missing token"))?;
    let (token, exp) = JwtKeys::from_ref(&state).refresh(token)?;
    Ok(Json(TokenResponse { token, exp }))
}

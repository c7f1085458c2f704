use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Request body for sign-up and sign-in.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Signed bearer token and its expiry.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub exp: OffsetDateTime,
}

/// Response returned after sign-in: the session cookie rides along in headers.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub token: TokenResponse,
}

/// `{"message": ...}` acknowledgement shared by auth and recipe routes.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Bearer token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub refresh_window: Duration,
    pub refresh_extend: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            refresh_window: Duration::seconds(cfg.refresh_window_seconds),
            refresh_extend: Duration::minutes(cfg.refresh_extend_minutes),
        }
    }
}

impl JwtKeys {
    fn sign_until(&self, username: &str, exp: OffsetDateTime) -> AppResult<String> {
        let claims = Claims {
            sub: username.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::StoreUnavailable(e.into()))?;
        debug!(username, exp = %exp, "jwt signed");
        Ok(token)
    }

    /// Token issued at sign-in, valid for the configured TTL.
    pub fn sign(&self, username: &str) -> AppResult<(String, OffsetDateTime)> {
        let exp = OffsetDateTime::now_utc() + self.ttl;
        Ok((self.sign_until(username, exp)?, exp))
    }

    /// Check signature, issuer, audience and expiry (no leeway).
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "jwt rejected");
            AppError::unauthorized("invalid or expired token")
        })?;
        debug!(username = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    /// Swap a token that is about to expire for one with a fresh expiry.
    pub fn refresh(&self, token: &str) -> AppResult<(String, OffsetDateTime)> {
        let claims = self.verify(token)?;
        let now = OffsetDateTime::now_utc();
        let remaining = claims.exp - now.unix_timestamp();
        if remaining > self.refresh_window.whole_seconds() {
            return Err(AppError::TooEarly("token isn't expired yet".into()));
        }
        let exp = now + self.refresh_extend;
        Ok((self.sign_until(&claims.sub, exp)?, exp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: Duration::minutes(10),
            refresh_window: Duration::seconds(30),
            refresh_extend: Duration::minutes(5),
        }
    }

    #[test]
    fn sign_and_verify() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let (token, exp) = keys.sign("alice").expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp, exp.unix_timestamp());
    }

    #[test]
    fn verify_rejects_wrong_issuer_audience_or_secret() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let (token, _) = good.sign("alice").unwrap();
        let other_claims = make_keys("same-secret", "bad-iss", "bad-aud");
        let other_secret = make_keys("other-secret", "good-iss", "good-aud");
        assert!(matches!(other_claims.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(matches!(other_secret.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(matches!(good.verify("not.a.jwt"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn refresh_too_early_is_rejected() {
        let keys = make_keys("s", "i", "a");
        let (token, _) = keys.sign("alice").unwrap();
        assert!(matches!(keys.refresh(&token), Err(AppError::TooEarly(_))));
    }

    #[test]
    fn refresh_inside_window_extends_expiry() {
        let keys = make_keys("s", "i", "a");
        let soon = OffsetDateTime::now_utc() + Duration::seconds(10);
        let token = keys.sign_until("alice", soon).unwrap();

        let (fresh, exp) = keys.refresh(&token).expect("refresh");
        let claims = keys.verify(&fresh).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(exp > soon);
        assert!(exp <= OffsetDateTime::now_utc() + Duration::minutes(5) + Duration::seconds(1));
    }

    #[test]
    fn refresh_of_expired_token_is_unauthorized() {
        let keys = make_keys("s", "i", "a");
        let past = OffsetDateTime::now_utc() - Duration::seconds(5);
        let token = keys.sign_until("alice", past).unwrap();
        assert!(matches!(keys.refresh(&token), Err(AppError::Unauthorized(_))));
    }
}

//! Stateless session tokens and the cookie that carries them.
//!
//! A session is an HS256-signed JWT naming the user's public id, email,
//! username and role. Nothing is stored server-side; a token is valid until
//! it expires or the signing secret changes.

use axum_extra::extract::cookie::{Cookie, SameSite};
use bazaar_core::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User public id.
    pub sub: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// The authenticated subject of a request, inserted as a request extension
/// by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
}

impl Session {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Issues and verifies session tokens and builds the matching cookies.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_days: i64,
    cookie_secure: bool,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, ttl_days: i64, cookie_secure: bool) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_days,
            cookie_secure,
        }
    }

    /// Sign a token for `session` valid for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if encoding fails.
    pub fn issue(&self, session: &Session) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: session.user_id.to_string(),
            email: session.email.clone(),
            username: session.username.clone(),
            role: session.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.ttl_days)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature and expiry and recover the session.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] for an expired token and
    /// [`TokenError::Invalid`] for anything else that fails to verify.
    pub fn verify(&self, token: &str) -> Result<Session, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| TokenError::Invalid("subject is not a user id".to_string()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        Ok(Session {
            user_id,
            email: claims.email,
            username: claims.username,
            role,
        })
    }

    /// HTTP-only cookie carrying `token`, living as long as the token does.
    #[must_use]
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.cookie_secure)
            .max_age(time::Duration::days(self.ttl_days))
            .build()
    }

    /// Cookie that overwrites and immediately expires the session cookie.
    #[must_use]
    pub fn cleared_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.cookie_secure)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn session(role: Role) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "asha@example.com".to_string(),
            username: "asha".to_string(),
            role,
        }
    }

    #[test]
    fn issued_token_verifies_back_to_the_same_session() {
        let tokens = TokenService::new(SECRET, 7, false);
        let original = session(Role::Admin);

        let token = tokens.issue(&original).expect("issue");
        let verified = tokens.verify(&token).expect("verify");

        assert_eq!(verified, original);
        assert!(verified.is_admin());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new(SECRET, -1, false);
        let token = tokens.issue(&session(Role::User)).expect("issue");

        assert!(matches!(tokens.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let tokens = TokenService::new(SECRET, 7, false);
        let token = tokens.issue(&session(Role::User)).expect("issue");

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = parts[1].chars().rev().collect::<String>();
        parts[1] = &forged_payload;
        let forged = parts.join(".");

        assert!(matches!(tokens.verify(&forged), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let issuer = TokenService::new("another-secret-another-secret-xx", 7, false);
        let verifier = TokenService::new(SECRET, 7, false);
        let token = issuer.issue(&session(Role::User)).expect("issue");

        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = TokenService::new(SECRET, 7, false);
        assert!(tokens.verify("not.a.jwt").is_err());
        assert!(tokens.verify("").is_err());
    }

    #[test]
    fn session_cookie_attributes() {
        let tokens = TokenService::new(SECRET, 7, true);
        let cookie = tokens.session_cookie("abc".to_string());

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let tokens = TokenService::new(SECRET, 7, false);
        let cookie = tokens.cleared_cookie();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}

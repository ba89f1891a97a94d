//! Password hashing and HTTP Basic authentication.
//!
//! Hashes are `salt$hex(sha256(salt || password))` with a random UUID salt.
//! Good enough for a local single-host deployment; not a password KDF.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use super::errors::ApiError;
use super::AppState;
use crate::UserId;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

/// Check a password against a stored `salt$hex` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => {
            constant_time_eq(digest(salt, password).as_bytes(), expected.as_bytes())
        }
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Byte comparison whose running time depends only on the input lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Split an `Authorization: Basic ...` header value into username/password.
fn parse_basic(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// The authenticated caller, resolved from HTTP Basic credentials.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: UserId,
}

#[axum::async_trait]
impl<M> FromRequestParts<AppState<M>> for AuthUser
where
    M: Send + Sync + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<M>,
    ) -> Result<Self, Self::Rejection> {
        let (username, password) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(ApiError::Unauthorized)?;

        match state.store.user_credentials(&username)? {
            Some((user, hash)) if verify_password(&password, &hash) => {
                Ok(AuthUser { id: user.id })
            }
            _ => {
                tracing::debug!(username = %username, "rejected credentials");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

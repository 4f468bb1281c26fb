//! Bearer token gate for protected endpoints

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AuthError;

use super::token::{verify, Claim};

/// Prefix of an `Authorization` header carrying a bearer token
pub const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated caller, produced from a verified token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<Claim> for Principal {
    fn from(claim: Claim) -> Self {
        Self {
            subject: claim.subject,
            issued_at: claim.issued_at,
            expires_at: claim.expires_at,
        }
    }
}

/// Verify the bearer token in an `Authorization` header value
///
/// Errors from token verification pass through unchanged.
pub fn authorize(
    header: Option<&str>,
    secret: &[u8],
    expected_subject: &str,
    now: DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let token = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::MissingCredentials)?;

    verify(token, secret, expected_subject, now).map(Principal::from)
}

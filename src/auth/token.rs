//! Bearer token issuance and verification
//!
//! A token is `<claim>.<signature>` where `<claim>` is the URL-safe Base64
//! (no padding) encoding of the JSON claim `{"sub":..,"iat":..,"exp":..}`
//! and `<signature>` is the URL-safe Base64 encoding of
//! `HMAC-SHA256(secret, <claim>)`.
//!
//! Verification needs nothing but the token, the secret, the expected subject
//! and the current time, so any server holding the secret can validate any
//! token it issued. There is no server-side session state.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Separator between the encoded claim and the signature
pub const TOKEN_DELIMITER: char = '.';

/// Length of an encoded signature (32 bytes in unpadded Base64)
pub const SIGNATURE_LENGTH: usize = 43;

/// The signed statement carried by a token
///
/// Timestamps travel as integer milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claim {
    /// Authenticated username
    #[serde(rename = "sub")]
    pub subject: String,

    /// When the token was issued
    #[serde(rename = "iat", with = "chrono::serde::ts_milliseconds")]
    pub issued_at: DateTime<Utc>,

    /// When the token stops being accepted
    #[serde(rename = "exp", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claim {
    /// Create a claim valid for `validity` starting at `issued_at`
    ///
    /// Both timestamps are truncated to millisecond precision so that a
    /// decoded claim compares equal to the one that was issued.
    pub fn new(subject: impl Into<String>, issued_at: DateTime<Utc>, validity: Duration) -> Self {
        let issued_at = issued_at.trunc_subsecs(3);
        Self {
            subject: subject.into(),
            issued_at,
            expires_at: (issued_at + validity).trunc_subsecs(3),
        }
    }
}

/// A signed token as handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    encoded_claim: String,
    signature: String,
}

impl Token {
    /// The Base64 encoded claim segment
    pub fn encoded_claim(&self) -> &str {
        &self.encoded_claim
    }

    /// The Base64 encoded signature segment
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.encoded_claim, TOKEN_DELIMITER, self.signature)
    }
}

/// Issue a signed token for `claim`
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use site_cms::auth::token::{issue, verify, Claim};
///
/// let now = Utc::now();
/// let claim = Claim::new("admin", now, Duration::hours(2));
/// let token = issue(&claim, b"server-secret").to_string();
///
/// assert_eq!(token.matches('.').count(), 1);
/// assert_eq!(verify(&token, b"server-secret", "admin", now).unwrap(), claim);
/// ```
pub fn issue(claim: &Claim, secret: &[u8]) -> Token {
    // Field order of `Claim` fixes the key order of the JSON payload.
    let payload = serde_json::to_vec(claim).expect("claim serialization cannot fail");
    let encoded_claim = URL_SAFE_NO_PAD.encode(payload);
    let tag = keyed_mac(secret, &encoded_claim).finalize().into_bytes();
    let signature = URL_SAFE_NO_PAD.encode(tag);

    Token {
        encoded_claim,
        signature,
    }
}

/// Verify a token string and return its claim
///
/// Checks, in order: shape, claim decoding, signature, subject, expiry.
/// A token is still valid at exactly `expires_at`.
pub fn verify(
    token: &str,
    secret: &[u8],
    expected_subject: &str,
    now: DateTime<Utc>,
) -> Result<Claim, AuthError> {
    let (encoded_claim, signature) = split_token(token).ok_or(AuthError::MalformedToken)?;

    let claim = decode_claim(encoded_claim)?;

    let provided = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::BadSignature)?;
    keyed_mac(secret, encoded_claim)
        .verify_slice(&provided)
        .map_err(|_| AuthError::BadSignature)?;

    if claim.subject != expected_subject {
        return Err(AuthError::SubjectMismatch);
    }

    if now > claim.expires_at {
        return Err(AuthError::Expired);
    }

    Ok(claim)
}

/// Split into exactly two non-empty segments
fn split_token(token: &str) -> Option<(&str, &str)> {
    let mut parts = token.split(TOKEN_DELIMITER);
    let encoded_claim = parts.next()?;
    let signature = parts.next()?;

    if parts.next().is_some() || encoded_claim.is_empty() || signature.is_empty() {
        return None;
    }

    Some((encoded_claim, signature))
}

fn decode_claim(encoded_claim: &str) -> Result<Claim, AuthError> {
    let payload = URL_SAFE_NO_PAD
        .decode(encoded_claim)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedToken)
}

fn keyed_mac(secret: &[u8], encoded_claim: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(encoded_claim.as_bytes());
    mac
}

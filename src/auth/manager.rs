//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It handles admin login, token issuance and bearer token validation, and owns
//! the rate limiter guarding the login endpoint.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

use super::gate::{self, Principal};
use super::ratelimit::{RateLimitConfig, RateLimiter};
use super::token::{issue, Claim};

/// Maximum username length in characters
pub const MAX_USERNAME_CHARS: usize = 50;

/// Maximum password length in characters
pub const MAX_PASSWORD_CHARS: usize = 100;

/// Configuration for the authentication manager
#[derive(Clone)]
pub struct AuthConfig {
    /// Admin username; also the only accepted token subject
    pub admin_username: String,

    /// Admin password (plaintext, compared in constant time)
    pub admin_password: String,

    /// HMAC key used to sign tokens
    pub secret: Vec<u8>,

    /// Lifetime of issued tokens
    pub token_validity: Duration,

    /// Delay applied before answering a failed login
    pub failure_delay: std::time::Duration,

    /// Rate limit configuration for login attempts
    pub rate_limit: RateLimitConfig,
}

impl AuthConfig {
    /// Create a configuration with default validity, delay and rate limit
    pub fn new(
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            admin_username: admin_username.into(),
            admin_password: admin_password.into(),
            secret: secret.into(),
            token_validity: Duration::hours(2),
            failure_delay: std::time::Duration::from_millis(1000),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("token_validity", &self.token_validity)
            .field("failure_delay", &self.failure_delay)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Token string to present as `Authorization: Bearer <token>`
    pub token: String,

    /// Authenticated username
    pub subject: String,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Authentication manager
///
/// Provides methods for logging in and for authorizing bearer tokens.
pub struct AuthManager {
    config: AuthConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl AuthManager {
    /// Create a new authentication manager
    pub fn new(config: AuthConfig) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            rate_limiter,
        }
    }

    /// Admin username
    pub fn admin_username(&self) -> &str {
        &self.config.admin_username
    }

    /// Lifetime of issued tokens
    pub fn token_validity(&self) -> Duration {
        self.config.token_validity
    }

    /// Rate limiter guarding login attempts
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Time until `client` may attempt to log in again
    pub fn retry_after(&self, client: &str, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.rate_limiter.retry_after(client, now)
    }

    /// Log in with username and password
    ///
    /// Every call consumes one rate-limit slot for `client`, including calls
    /// with malformed input. A credential mismatch is answered only after the
    /// configured failure delay.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if !self.rate_limiter.check(client, now) {
            tracing::warn!(client = %client, "Login rate limited");
            return Err(AuthError::RateLimited);
        }

        if !is_valid_input(username, password) {
            tracing::debug!(client = %client, "Login rejected: invalid input");
            return Err(AuthError::InvalidInput);
        }

        if !self.credentials_match(username, password) {
            tracing::warn!(client = %client, "Login failed: invalid credentials");
            tokio::time::sleep(self.config.failure_delay).await;
            return Err(AuthError::InvalidCredentials);
        }

        let claim = Claim::new(username, now, self.config.token_validity);
        let token = issue(&claim, &self.config.secret);

        tracing::info!(
            client = %client,
            user = %claim.subject,
            expires_at = %claim.expires_at,
            "Login succeeded"
        );

        Ok(IssuedToken {
            token: token.to_string(),
            subject: claim.subject,
            issued_at: claim.issued_at,
            expires_at: claim.expires_at,
        })
    }

    /// Authorize a request from its `Authorization` header value
    pub fn authorize(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthError> {
        gate::authorize(
            header,
            &self.config.secret,
            &self.config.admin_username,
            now,
        )
    }

    // Both fields are always compared so timing does not reveal which one differed.
    fn credentials_match(&self, username: &str, password: &str) -> bool {
        let user_ok = username
            .as_bytes()
            .ct_eq(self.config.admin_username.as_bytes());
        let pass_ok = password
            .as_bytes()
            .ct_eq(self.config.admin_password.as_bytes());
        (user_ok & pass_ok).into()
    }
}

fn is_valid_input(username: &str, password: &str) -> bool {
    let username_len = username.chars().count();
    let password_len = password.chars().count();

    (1..=MAX_USERNAME_CHARS).contains(&username_len)
        && (1..=MAX_PASSWORD_CHARS).contains(&password_len)
}

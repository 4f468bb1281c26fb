//! Application error types for site-cms
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Authentication-related errors
///
/// The token-rejection variants (`MissingCredentials`, `MalformedToken`,
/// `BadSignature`, `SubjectMismatch`, `Expired`) are collapsed into a single
/// generic response at the HTTP boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username or password missing or too long
    #[error("Invalid input")]
    InvalidInput,

    /// Too many login attempts from the same client
    #[error("Rate limited: too many requests")]
    RateLimited,

    /// Username or password did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing or non-bearer authorization header
    #[error("Missing bearer credentials")]
    MissingCredentials,

    /// Token could not be split or decoded
    #[error("Malformed token")]
    MalformedToken,

    /// Token signature does not match its claim
    #[error("Bad token signature")]
    BadSignature,

    /// Token was issued for a different subject
    #[error("Token subject mismatch")]
    SubjectMismatch,

    /// Token is past its expiry time
    #[error("Token expired")]
    Expired,
}

impl AuthError {
    /// Returns true for errors raised while checking a presented bearer token
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentials
                | AuthError::MalformedToken
                | AuthError::BadSignature
                | AuthError::SubjectMismatch
                | AuthError::Expired
        )
    }
}

/// Content store errors
#[derive(Debug, Error)]
pub enum ContentError {
    /// IO error while reading or writing content
    #[error("Content IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be (de)serialized
    #[error("Content serialization error: {0}")]
    Serialization(String),

    /// Required top-level section is missing or empty
    #[error("Invalid content structure: missing {0}")]
    InvalidStructure(String),
}

/// GitHub REST API errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GitHubError {
    /// Request could not be sent or the response body could not be read
    #[error("GitHub request failed: {0}")]
    Network(String),

    /// GitHub answered with a non-success status
    #[error("GitHub API error: HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Unexpected GitHub response: {0}")]
    InvalidResponse(String),
}

/// Publishing errors
#[derive(Debug, Error)]
pub enum PublishError {
    /// GitHub publishing failed
    #[error("GitHub publish failed: {0}")]
    GitHub(#[from] GitHubError),

    /// A local git command failed
    #[error("Git command failed: {0}")]
    Git(String),

    /// Current content could not be loaded
    #[error("Content error: {0}")]
    Content(#[from] ContentError),
}

/// Image upload errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// `image` or `filename` missing
    #[error("Image and filename required")]
    MissingField,

    /// Not a base64 `data:image/...` URL
    #[error("Invalid image format")]
    InvalidFormat,

    /// Decoded image exceeds the configured limit
    #[error("Image too large (max {})", format_size(.max_bytes))]
    TooLarge { max_bytes: usize },

    /// GitHub storage selected but no token configured
    #[error("GitHub integration required")]
    NotConfigured,

    /// IO error while writing the image
    #[error("Upload IO error: {0}")]
    Io(#[from] std::io::Error),

    /// GitHub storage failed
    #[error("GitHub upload failed: {0}")]
    GitHub(#[from] GitHubError),
}

fn format_size(bytes: &usize) -> String {
    const MIB: usize = 1024 * 1024;
    if *bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Content error
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Upload error
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

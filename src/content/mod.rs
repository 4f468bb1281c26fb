//! Content storage for the site's `content.json`
//!
//! This module defines the [`ContentStore`] trait used by the HTTP handlers,
//! a filesystem implementation, and the sanitization applied to incoming
//! documents before they are stored.

pub mod filesystem;
pub mod sanitize;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ContentError;

pub use filesystem::FileContentStore;
pub use sanitize::{sanitize_content, validate_structure};

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Time the content was written
    pub timestamp: DateTime<Utc>,
}

/// Storage for the site content document
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read the current content document
    async fn load(&self) -> Result<Value, ContentError>;

    /// Replace the content document, keeping a backup of the previous one
    async fn save(&self, content: Value, now: DateTime<Utc>) -> Result<SaveReceipt, ContentError>;
}

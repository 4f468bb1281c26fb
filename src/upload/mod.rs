//! Image uploads
//!
//! Images arrive as base64 `data:image/...` URLs. They are decoded, size
//! checked, given a generated safe file name and handed to an [`ImageSink`].

pub mod github;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::UploadError;

pub use github::GitHubImageSink;
pub use local::LocalImageSink;

const DATA_URL_PREFIX: &str = "data:image/";
const BASE64_MARKER: &str = ";base64";

/// A decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// MIME subtype, e.g. `png`
    pub subtype: String,
    pub bytes: Vec<u8>,
}

/// Where an image ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub url: String,
}

/// Destination for uploaded images
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store `bytes` under `filename`
    async fn store(
        &self,
        filename: &str,
        bytes: &[u8],
        kind: &str,
    ) -> Result<StoredImage, UploadError>;
}

/// Decode a `data:image/<subtype>;base64,<data>` URL
pub fn parse_data_url(image: &str, max_bytes: usize) -> Result<DecodedImage, UploadError> {
    let rest = image
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or(UploadError::InvalidFormat)?;
    let (header, data) = rest.split_once(',').ok_or(UploadError::InvalidFormat)?;
    let subtype = header
        .strip_suffix(BASE64_MARKER)
        .filter(|s| !s.is_empty())
        .ok_or(UploadError::InvalidFormat)?;

    // Reject obviously oversized payloads before decoding them.
    if data.len() / 4 * 3 > max_bytes + 3 {
        return Err(UploadError::TooLarge { max_bytes });
    }

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| UploadError::InvalidFormat)?;
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge { max_bytes });
    }

    Ok(DecodedImage {
        subtype: subtype.to_string(),
        bytes,
    })
}

/// Generate a safe file name `<kind>-<millis><ext>`
///
/// The extension is taken from `filename` after dropping everything outside
/// `[a-zA-Z0-9._-]`; it falls back to `.png`. `kind` is reduced to
/// `[a-z0-9_-]` and falls back to `upload`.
pub fn safe_filename(filename: &str, kind: Option<&str>, now: DateTime<Utc>) -> String {
    let base: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .to_lowercase();
    let ext = match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => &base[idx..],
        _ => ".png",
    };

    let kind: String = kind
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect::<String>()
        .to_lowercase();
    let kind = if kind.is_empty() { "upload" } else { &kind };

    format!("{}-{}{}", kind, now.timestamp_millis(), ext)
}

/// Validates uploads and stores them through a sink
pub struct ImageUploader {
    sink: Arc<dyn ImageSink>,
    max_bytes: usize,
}

impl ImageUploader {
    pub fn new(sink: Arc<dyn ImageSink>, max_bytes: usize) -> Self {
        Self { sink, max_bytes }
    }

    /// Decode, name and store an image
    pub async fn upload(
        &self,
        image: Option<&str>,
        filename: Option<&str>,
        kind: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StoredImage, UploadError> {
        let (image, filename) = match (image, filename) {
            (Some(image), Some(filename)) if !image.is_empty() && !filename.is_empty() => {
                (image, filename)
            }
            _ => return Err(UploadError::MissingField),
        };

        let decoded = parse_data_url(image, self.max_bytes)?;
        let name = safe_filename(filename, kind, now);
        let kind = kind.filter(|k| !k.is_empty()).unwrap_or("image");

        let stored = self.sink.store(&name, &decoded.bytes, kind).await?;

        tracing::info!(
            filename = %stored.filename,
            subtype = %decoded.subtype,
            bytes = decoded.bytes.len(),
            "Image uploaded"
        );

        Ok(stored)
    }
}

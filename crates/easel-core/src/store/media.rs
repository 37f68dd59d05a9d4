//! `data:` URL encoding for media payloads.

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A stored media payload, keyed by element id in the media table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// Seconds, for video payloads.
    pub duration: Option<f32>,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl MediaBlob {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            duration: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_duration(mut self, duration: Option<f32>) -> Self {
        self.duration = duration;
        self
    }

    /// Decodes a base64 `data:` URL.
    pub fn from_data_url(url: &str) -> Result<Self, StorageError> {
        let (mime, bytes) = decode_data_url(url)?;
        Ok(Self::new(bytes, mime))
    }

    /// Same payload, type and duration. The creation time is ignored.
    pub fn same_content(&self, other: &MediaBlob) -> bool {
        self.mime == other.mime && self.duration == other.duration && self.bytes == other.bytes
    }

    pub fn to_data_url(&self) -> String {
        encode_data_url(&self.mime, &self.bytes)
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Splits a `data:<mime>[;base64],<payload>` URL into its MIME type and bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), StorageError> {
    let invalid = || StorageError::InvalidDataUrl(truncate(url));

    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;

    let (mime, is_base64) = match header.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (header, false),
    };
    let mime = if mime.is_empty() {
        "text/plain".to_string()
    } else {
        mime.to_string()
    };

    let bytes = if is_base64 {
        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|_| invalid())?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((mime, bytes))
}

/// MIME type for a file extension the canvas accepts.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

fn truncate(url: &str) -> String {
    url.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_binary() {
        let bytes: Vec<u8> = (0..=255).collect();
        let url = encode_data_url("image/png", &bytes);
        assert!(url.starts_with("data:image/png;base64,"));

        let (mime, decoded) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn rejects_non_data_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("mov"), Some("video/quicktime"));
        assert_eq!(mime_for_extension("txt"), None);
    }
}

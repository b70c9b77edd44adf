//! Sticker images collected for message formatting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: String,
    pub url: String,
    /// Host the sticker was collected from.
    pub source: String,
    #[serde(default)]
    pub cached_at: i64,
}

impl Sticker {
    pub fn new(url: &str, source: &str) -> Self {
        Self {
            id: sticker_id(url),
            url: url.to_string(),
            source: source.to_string(),
            cached_at: 0,
        }
    }
}

/// Stable id for an image URL: first 16 hex chars of its SHA-256.
pub fn sticker_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}

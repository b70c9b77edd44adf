//! Scraper error types.

use thiserror::Error;

use super::retry::{Cancelled, Failure};

/// Errors produced while fetching or parsing upstream pages.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("rate limited by {url}")]
    RateLimited { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot encode {0:?} as Big5")]
    Encoding(String),
    #[error("unexpected document from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("no candidate base URL configured for domain {0}")]
    NoCandidates(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("shared scrape aborted: {0}")]
    Aborted(String),
}

impl ScrapeError {
    /// Whether retrying the same request can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            ScrapeError::Status { status, .. } => matches!(status, 401 | 403 | 404),
            ScrapeError::Encoding(_)
            | ScrapeError::Parse { .. }
            | ScrapeError::Invalid(_)
            | ScrapeError::NoCandidates(_)
            | ScrapeError::Cancelled => true,
            ScrapeError::RateLimited { .. }
            | ScrapeError::Transport { .. }
            | ScrapeError::Aborted(_) => false,
        }
    }

    /// Whether the query layer should report this as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ScrapeError::Status {
                status: 401 | 403 | 404,
                ..
            } | ScrapeError::Parse { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ScrapeError::Status { status, .. } => Some(*status),
            ScrapeError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    pub(crate) fn parse(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Parse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<Cancelled> for ScrapeError {
    fn from(_: Cancelled) -> Self {
        ScrapeError::Cancelled
    }
}

impl From<ScrapeError> for Failure<ScrapeError> {
    fn from(e: ScrapeError) -> Self {
        if e.is_permanent() {
            Failure::Permanent(e)
        } else {
            Failure::Transient(e)
        }
    }
}

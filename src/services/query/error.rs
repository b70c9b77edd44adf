//! Errors surfaced to the formatting layer.

use std::sync::Arc;

use thiserror::Error;

use crate::repository::StoreError;
use crate::scrapers::ScrapeError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no matching record")]
    NotFound,
    #[error("upstream temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("invalid query: {0}")]
    Invalid(String),
    #[error("cache read failed: {0}")]
    Storage(#[from] StoreError),
    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Whether the caller may usefully ask again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Unavailable(_))
    }
}

impl From<&ScrapeError> for QueryError {
    fn from(e: &ScrapeError) -> Self {
        match e {
            ScrapeError::Cancelled => QueryError::Cancelled,
            e if e.is_not_found() => QueryError::NotFound,
            ScrapeError::Invalid(msg) => QueryError::Invalid(msg.clone()),
            ScrapeError::Encoding(text) => {
                QueryError::Invalid(format!("{text:?} cannot be sent upstream"))
            }
            other => QueryError::Unavailable(other.to_string()),
        }
    }
}

impl From<Arc<ScrapeError>> for QueryError {
    fn from(e: Arc<ScrapeError>) -> Self {
        QueryError::from(e.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_mapping() {
        let missing = ScrapeError::Status {
            status: 404,
            url: "http://sea.test/".to_string(),
        };
        assert!(matches!(QueryError::from(&missing), QueryError::NotFound));

        let busy = ScrapeError::Status {
            status: 503,
            url: "http://sea.test/".to_string(),
        };
        let err = QueryError::from(&busy);
        assert!(err.is_retryable());

        let emoji = ScrapeError::Encoding("😀".to_string());
        assert!(matches!(QueryError::from(&emoji), QueryError::Invalid(_)));
        assert!(matches!(
            QueryError::from(&ScrapeError::Cancelled),
            QueryError::Cancelled
        ));
        assert!(matches!(
            QueryError::from(&ScrapeError::NoCandidates("sea".into())),
            QueryError::Unavailable(_)
        ));
    }
}

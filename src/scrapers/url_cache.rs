//! Per-domain cache of the last base URL known to respond.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ScrapeError;
use super::http_client::HttpClient;

/// Working-URL cell for one upstream domain.
///
/// Reads are a single atomic load. Concurrent slow-path probes are allowed;
/// the last one to finish wins.
#[derive(Debug)]
pub struct UrlCache {
    domain: String,
    candidates: Vec<String>,
    current: ArcSwapOption<String>,
    /// Candidate index the next probe starts from.
    next_probe: AtomicUsize,
}

impl UrlCache {
    pub fn new(domain: impl Into<String>, candidates: Vec<String>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|c| c.trim_end_matches('/').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            domain: domain.into(),
            candidates,
            current: ArcSwapOption::empty(),
            next_probe: AtomicUsize::new(0),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The cached base URL, without probing.
    pub fn get_cached(&self) -> Option<String> {
        self.current.load_full().map(|url| url.as_ref().clone())
    }

    /// The working base URL, probing candidates if none is cached.
    ///
    /// When every probe fails the first candidate is returned (uncached) so a
    /// noisy health check does not fail the whole request.
    pub async fn get(
        &self,
        http: &HttpClient,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        if let Some(url) = self.get_cached() {
            return Ok(url);
        }
        if self.candidates.is_empty() {
            return Err(ScrapeError::NoCandidates(self.domain.clone()));
        }

        let start = self.next_probe.load(Ordering::Relaxed) % self.candidates.len();
        for offset in 0..self.candidates.len() {
            let candidate = &self.candidates[(start + offset) % self.candidates.len()];
            match http.head_status(cancel, candidate).await {
                Ok(status) if status < 500 => {
                    info!("Using {} for {}", candidate, self.domain);
                    self.store(candidate);
                    return Ok(candidate.clone());
                }
                Ok(status) => debug!("Probe of {} returned {}", candidate, status),
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => debug!("Probe of {} failed: {}", candidate, e),
            }
        }

        let fallback = self.candidates[0].clone();
        warn!(
            "No candidate for {} answered the health probe, falling back to {}",
            self.domain, fallback
        );
        Ok(fallback)
    }

    pub fn store(&self, url: &str) {
        self.current.store(Some(Arc::new(url.to_string())));
    }

    /// Forget the cached URL; the next `get` re-probes.
    pub fn clear(&self) {
        self.current.store(None);
    }

    /// Invalidate after `url` failed a real request. The next probe starts
    /// at the candidate after it.
    pub fn mark_failed(&self, url: &str) {
        if let Some(index) = self.candidates.iter().position(|c| c == url) {
            self.next_probe.store(index + 1, Ordering::Relaxed);
        }
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> UrlCache {
        UrlCache::new(
            "sea",
            vec!["http://a.test/".to_string(), "http://b.test".to_string()],
        )
    }

    #[test]
    fn test_candidates_are_normalised() {
        assert_eq!(cache().candidates(), ["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_store_and_clear() {
        let c = cache();
        assert_eq!(c.get_cached(), None);
        c.store("http://b.test");
        assert_eq!(c.get_cached().as_deref(), Some("http://b.test"));
        c.clear();
        assert_eq!(c.get_cached(), None);
    }

    #[test]
    fn test_mark_failed_advances_probe_start() {
        let c = cache();
        c.store("http://a.test");
        c.mark_failed("http://a.test");
        assert_eq!(c.get_cached(), None);
        assert_eq!(c.next_probe.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let c = UrlCache::new("lms", Vec::new());
        let http = HttpClient::new(&Default::default()).unwrap();
        let err = c.get(&http, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ScrapeError::NoCandidates(d) if d == "lms"));
    }

    #[tokio::test]
    async fn test_cached_value_skips_probe() {
        let c = UrlCache::new("sea", vec!["http://127.0.0.1:9".to_string()]);
        c.store("http://cached.test");
        let http = HttpClient::new(&Default::default()).unwrap();
        let url = c.get(&http, &CancellationToken::new()).await.unwrap();
        assert_eq!(url, "http://cached.test");
    }

    #[tokio::test]
    async fn test_all_probes_failing_falls_back_to_first_candidate() {
        let c = UrlCache::new(
            "sea",
            vec!["http://127.0.0.1:9".to_string(), "http://127.0.0.1:7".to_string()],
        );
        // Rotation moves the probe start, not the fallback
        c.mark_failed("http://127.0.0.1:9");
        let http = HttpClient::new(&Default::default()).unwrap();
        let url = c.get(&http, &CancellationToken::new()).await.unwrap();
        assert_eq!(url, "http://127.0.0.1:9");
        assert_eq!(c.get_cached(), None);
    }
}

//! Domain-bound fetch helper: base URL resolution plus failover.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ScrapeError;
use super::http_client::{HttpClient, Page};
use super::retry::{self, Failure};
use super::url_cache::UrlCache;

/// Fetches paths on one logical host.
///
/// Each attempt inside the retry loop resolves the base URL anew, so a
/// failed candidate is replaced by the next one before the retry.
#[derive(Clone)]
pub struct Upstream {
    http: HttpClient,
    urls: Arc<UrlCache>,
}

impl Upstream {
    pub fn new(http: HttpClient, urls: Arc<UrlCache>) -> Self {
        Self { http, urls }
    }

    pub fn domain(&self) -> &str {
        self.urls.domain()
    }

    pub fn url_cache(&self) -> &Arc<UrlCache> {
        &self.urls
    }

    /// Current base URL, probing if needed.
    pub async fn base_url(&self, cancel: &CancellationToken) -> Result<String, ScrapeError> {
        self.urls.get(&self.http, cancel).await
    }

    /// GET `path` (which starts with `/`).
    pub async fn get(&self, cancel: &CancellationToken, path: &str) -> Result<Page, ScrapeError> {
        self.fetch(cancel, path, None).await
    }

    /// POST a UTF-8 form to `path`.
    pub async fn post_form(
        &self,
        cancel: &CancellationToken,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<Page, ScrapeError> {
        let body = super::http_client::encode_form(form);
        self.fetch(cancel, path, Some(&body)).await
    }

    /// POST a pre-encoded body to `path`.
    pub async fn post_raw(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: &str,
    ) -> Result<Page, ScrapeError> {
        self.fetch(cancel, path, Some(body)).await
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        path: &str,
        body: Option<&str>,
    ) -> Result<Page, ScrapeError> {
        retry::run(cancel, self.http.retry_policy(), move || async move {
            let base = self.urls.get(&self.http, cancel).await.map_err(Failure::from)?;
            let url = format!("{}{}", base, path);
            match self.http.fetch_once(cancel, &url, body).await {
                Ok(page) => Ok(page),
                Err(e) => {
                    // A 404 or a bad payload came from a live host; keep it
                    if !e.is_permanent() {
                        debug!("{} failed on {}, invalidating", path, base);
                        self.urls.mark_failed(&base);
                    }
                    Err(Failure::from(e))
                }
            }
        })
        .await
    }
}

//! HTTP client for legacy campus pages.
//!
//! Every request carries a random desktop browser identity, gzip/deflate is
//! negotiated by the transport, and Big5 bodies are transcoded to UTF-8.
//! The public fetch methods retry transient failures through
//! [`retry::run`](super::retry::run).

mod response;
mod user_agent;

pub use response::{decode_body, is_big5, Page};
pub use user_agent::{random_user_agent, BROWSER_USER_AGENTS};

use std::time::Duration;

use reqwest::header::{self, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ScrapeError;
use super::retry::{self, parse_retry_after, Failure, RetryPolicy};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Transport settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Timeout for the `HEAD` probes used by failover.
    pub probe_timeout: Duration,
    /// Fixed pause after every request.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            request_delay: Duration::ZERO,
            retry: RetryPolicy::default(),
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// HTTP client with retry, status classification and Big5 decoding.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    request_delay: Duration,
    probe_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()?;

        Ok(Self {
            client,
            retry: config.retry,
            request_delay: config.request_delay,
            probe_timeout: config.probe_timeout,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET an HTML page, retrying transient failures.
    pub async fn get_document(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<Page, ScrapeError> {
        retry::run(cancel, self.retry, move || async move {
            self.fetch_once(cancel, url, None)
                .await
                .map_err(Failure::from)
        })
        .await
    }

    /// POST a UTF-8 form and return the HTML response.
    pub async fn post_form_document(
        &self,
        cancel: &CancellationToken,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Page, ScrapeError> {
        let body = encode_form(form);
        self.post_form_document_raw(cancel, url, &body).await
    }

    /// POST a pre-encoded form body.
    ///
    /// Used where the upstream expects percent-encoded Big5 bytes, which a
    /// UTF-8 form encoder cannot produce.
    pub async fn post_form_document_raw(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: &str,
    ) -> Result<Page, ScrapeError> {
        retry::run(cancel, self.retry, move || async move {
            self.fetch_once(cancel, url, Some(body))
                .await
                .map_err(Failure::from)
        })
        .await
    }

    /// One request without retry. `body` selects POST.
    ///
    /// A `429` sleeps for its `Retry-After` (cancellation-aware) before the
    /// error is returned to the retry loop.
    pub async fn fetch_once(
        &self,
        cancel: &CancellationToken,
        url: &str,
        body: Option<&str>,
    ) -> Result<Page, ScrapeError> {
        let request = match body {
            None => self.client.get(url),
            Some(body) => self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(body.to_string()),
        };
        let request = browser_headers(request);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            result = request.send() => result.map_err(|e| transport(url, e))?,
        };

        let status = response.status();
        let result = if status.is_success() {
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let final_url = response.url().to_string();
            let bytes = tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                result = response.bytes() => result.map_err(|e| transport(url, e))?,
            };
            Ok(Page::new(
                final_url,
                decode_body(&bytes, content_type.as_deref()),
            ))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = parse_retry_after(
                response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            if let Some(wait) = wait {
                warn!("Rate limited by {}, waiting {:?}", url, wait);
                retry::sleep(cancel, wait).await?;
            }
            Err(ScrapeError::RateLimited {
                url: url.to_string(),
            })
        } else {
            debug!("HTTP {} from {}", status.as_u16(), url);
            Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        };

        if !self.request_delay.is_zero() {
            retry::sleep(cancel, self.request_delay).await?;
        }

        result
    }

    /// Status code of a `HEAD` request, used to probe failover candidates.
    pub async fn head_status(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<u16, ScrapeError> {
        let request = browser_headers(self.client.head(url).timeout(self.probe_timeout));
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            result = request.send() => result.map_err(|e| transport(url, e))?,
        };
        Ok(response.status().as_u16())
    }
}

fn browser_headers(request: RequestBuilder) -> RequestBuilder {
    request
        .header(header::USER_AGENT, random_user_agent())
        .header(header::ACCEPT, HeaderValue::from_static(user_agent::ACCEPT))
        .header(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(user_agent::ACCEPT_LANGUAGE),
        )
}

fn transport(url: &str, source: reqwest::Error) -> ScrapeError {
    ScrapeError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Encode `form` as `application/x-www-form-urlencoded` UTF-8.
pub fn encode_form(form: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form.iter())
        .finish()
}

//! Sticker images scraped from configured source pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use super::error::ScrapeError;
use super::html::{host_of, resolve};
use super::http_client::HttpClient;
use crate::models::Sticker;

static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("valid selector"));

/// Fetches sticker source pages directly; they are not behind failover.
#[derive(Clone)]
pub struct StickerScraper {
    http: HttpClient,
}

impl StickerScraper {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        source_url: &str,
    ) -> Result<Vec<Sticker>, ScrapeError> {
        let page = self.http.get_document(cancel, source_url).await?;
        Ok(parse_stickers(&page.url, &page.html()))
    }
}

/// Every image on the page, resolved and deduplicated in document order.
pub fn parse_stickers(page_url: &str, document: &Html) -> Vec<Sticker> {
    let source = host_of(page_url).unwrap_or_default();
    let mut seen = HashSet::new();
    document
        .select(&IMAGE)
        .filter_map(|img| resolve(page_url, img.value().attr("src")?))
        .filter(|url| url.starts_with("http") && seen.insert(url.clone()))
        .map(|url| Sticker::new(&url, &source))
        .collect()
}

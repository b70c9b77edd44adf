//! Decoded response bodies.

use encoding_rs::BIG5;
use scraper::Html;
use tracing::debug;

/// A successfully fetched HTML page, already transcoded to UTF-8.
///
/// Parsing into a [`Html`] tree happens on demand because the tree is not
/// `Send` and must not be held across an await point.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Whether a `Content-Type` header announces Big5.
pub fn is_big5(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("big5"))
        .unwrap_or(false)
}

/// Transcode a response body to UTF-8.
///
/// Gzip has already been undone by the transport. Undecodable Big5 bytes are
/// replaced with U+FFFD rather than failing the page.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    if is_big5(content_type) {
        let (text, had_errors) = BIG5.decode_without_bom_handling(bytes);
        if had_errors {
            debug!("Body contained bytes outside Big5, replaced");
        }
        text.into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

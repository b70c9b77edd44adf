//! Scrapers for the campus upstream hosts.
//!
//! Layering, leaves first: [`retry`] → [`HttpClient`] → [`UrlCache`] →
//! [`Upstream`] → one adapter per record kind → [`CampusScraper`].

pub mod big5;
mod campus;
pub mod contacts;
pub mod courses;
mod error;
pub mod html;
mod http_client;
pub mod programs;
pub mod retry;
mod source;
pub mod stickers;
pub mod students;
mod upstream;
mod url_cache;

pub use campus::{CampusScraper, Endpoints, LMS_DOMAIN, SEA_DOMAIN};
pub use contacts::{ContactScraper, DirectoryKind};
pub use courses::CourseScraper;
pub use error::ScrapeError;
pub use http_client::{decode_body, encode_form, HttpClient, HttpConfig, Page};
pub use programs::{ProgramFolder, ProgramScraper};
pub use retry::{Cancelled, Failure, RetryPolicy};
pub use source::CampusSource;
pub use stickers::StickerScraper;
pub use students::StudentScraper;
pub use upstream::Upstream;
pub use url_cache::UrlCache;

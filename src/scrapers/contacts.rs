//! Campus directory (校園通訊錄).
//!
//! Listing pages link to one result page per organization. A result page is
//! a run of `div.alert` headers, each followed by a table of members:
//!
//! ```text
//! <div class="alert">
//!   <a href="https://unit.example">資訊工程學系</a>
//!   上層單位：電機資訊學院<br>位置：電資大樓
//! </div>
//! <table> 姓名 | 英文姓名 | 職稱 | 分機 | 電子郵件 </table>
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use tokio_util::sync::CancellationToken;

use super::big5::big5_url_encode;
use super::error::ScrapeError;
use super::html::{collapse_whitespace, element_text, resolve, text_lines, to_path};
use super::upstream::Upstream;
use crate::models::Contact;

/// Main switchboard number, prefixed to extensions.
pub const CAMPUS_PHONE: &str = "0286741111";

const SUPERIOR_PREFIX: &str = "上層單位：";
const LOCATION_PREFIX: &str = "位置：";

static ORG_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="CAMPUS_DIR_M.p2"]"#).expect("valid selector"));
static ALERT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.alert").expect("valid selector"));
static NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a, b").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));

/// The two top-level directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryKind {
    Administrative,
    Academic,
}

impl DirectoryKind {
    pub const ALL: [DirectoryKind; 2] = [DirectoryKind::Administrative, DirectoryKind::Academic];

    fn code(&self) -> u8 {
        match self {
            DirectoryKind::Administrative => 1,
            DirectoryKind::Academic => 2,
        }
    }

    pub fn listing_path(&self) -> String {
        format!("/pls/ld/CAMPUS_DIR_M.p1?kind={}", self.code())
    }

    pub fn label(&self) -> &'static str {
        match self {
            DirectoryKind::Administrative => "administrative",
            DirectoryKind::Academic => "academic",
        }
    }
}

/// Directory search path for `term`, with the term sent as Big5.
pub fn search_path(term: &str) -> Result<String, ScrapeError> {
    Ok(format!("/pls/ld/CAMPUS_DIR_M.pq?q={}", big5_url_encode(term)?))
}

#[derive(Clone)]
pub struct ContactScraper {
    upstream: Upstream,
}

impl ContactScraper {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    /// Organization page paths linked from a listing.
    pub async fn directory_links(
        &self,
        cancel: &CancellationToken,
        kind: DirectoryKind,
    ) -> Result<Vec<String>, ScrapeError> {
        let page = self.upstream.get(cancel, &kind.listing_path()).await?;
        Ok(parse_directory_links(&page.url, &page.html()))
    }

    /// Contacts on one organization page.
    pub async fn contacts_at(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        let page = self.upstream.get(cancel, path).await?;
        Ok(parse_contacts(&page.url, &page.html()))
    }

    pub async fn search(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ScrapeError::Invalid("empty contact search".to_string()));
        }
        let page = self.upstream.get(cancel, &search_path(term)?).await?;
        Ok(parse_contacts(&page.url, &page.html()))
    }
}

/// Organization links as re-fetchable paths, deduplicated in document order.
pub fn parse_directory_links(page_url: &str, document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(&ORG_LINK)
        .filter_map(|a| resolve(page_url, a.value().attr("href")?))
        .filter_map(|url| to_path(&url))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Organizations and their members, in document order.
pub fn parse_contacts(page_url: &str, document: &Html) -> Vec<Contact> {
    let mut contacts = Vec::new();

    for alert in document.select(&ALERT) {
        let Some(org) = parse_organization(page_url, alert) else {
            continue;
        };
        let org_name = org.name.clone();
        contacts.push(org);

        if let Some(table) = members_table(alert) {
            contacts.extend(
                table
                    .select(&ROW)
                    .filter_map(|row| parse_member(&org_name, row)),
            );
        }
    }

    contacts
}

fn parse_organization(page_url: &str, alert: ElementRef) -> Option<Contact> {
    let name = alert
        .select(&NAME)
        .map(element_text)
        .find(|t| !t.is_empty())?;
    let mut org = Contact::organization(&name);

    org.website = alert
        .select(&LINK)
        .filter_map(|a| resolve(page_url, a.value().attr("href")?))
        .find(|url| url.starts_with("http") && !url.contains("CAMPUS_DIR_M"))
        .unwrap_or_default();

    for line in text_lines(alert) {
        if let Some(rest) = line_value(&line, SUPERIOR_PREFIX) {
            org.superior = rest;
        } else if let Some(rest) = line_value(&line, LOCATION_PREFIX) {
            org.location = rest;
        }
    }
    Some(org)
}

/// Text following `prefix` within a line, if the line carries it.
fn line_value(line: &str, prefix: &str) -> Option<String> {
    let (_, rest) = line.split_once(prefix)?;
    Some(rest.trim().to_string())
}

/// The table that directly follows an alert, stopping at the next alert.
fn members_table(alert: ElementRef) -> Option<ElementRef> {
    for sibling in alert.next_siblings().filter_map(ElementRef::wrap) {
        let el = sibling.value();
        if el.name() == "table" {
            return Some(sibling);
        }
        if el.name() == "div" && el.classes().any(|c| c == "alert") {
            return None;
        }
    }
    None
}

fn parse_member(organization: &str, row: ElementRef) -> Option<Contact> {
    let cells: Vec<ElementRef> = row.select(&CELL).collect();
    if cells.len() < 5 {
        return None;
    }
    let name = element_text(cells[0]);
    if name.is_empty() {
        return None;
    }

    let mut person = Contact::individual(organization, &name);
    person.name_en = element_text(cells[1]);
    person.title = element_text(cells[2]);
    person.extension = element_text(cells[3]);
    person.phone = phone_for(&person.extension);
    person.email = email_text(cells[4]);
    Some(person)
}

/// `{switchboard},{first five digits}` when the extension has at least five
/// digits, otherwise empty.
pub fn phone_for(extension: &str) -> String {
    let digits: String = extension.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 5 {
        return String::new();
    }
    format!("{},{}", CAMPUS_PHONE, &digits[..5])
}

/// Email cells hide the `@` as an image.
fn email_text(cell: ElementRef) -> String {
    let mut email = String::new();
    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => email.push_str(text),
            Node::Element(e) if e.name() == "img" => email.push('@'),
            _ => {}
        }
    }
    collapse_whitespace(&email).replace(' ', "")
}

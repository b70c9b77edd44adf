//! Student portfolio search.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ScrapeError;
use super::html::{element_text, max_page};
use super::http_client::Page;
use super::upstream::Upstream;
use crate::models::{is_student_id, search_keyword, Degree, Student};

static TILE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".bloglistTitle a").expect("valid selector"));
static PAGER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".BlogPager a").expect("valid selector"));

/// Search results path for `keyword`, 1-based `page`.
pub fn search_path(keyword: &str, page: u32) -> String {
    format!(
        "/portfolio/search.php?fmScope=2&page={}&fmKeyword={}",
        page,
        urlencoding::encode(keyword)
    )
}

/// Scrapes the portfolio search on the learning-management host.
#[derive(Clone)]
pub struct StudentScraper {
    upstream: Upstream,
}

impl StudentScraper {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    /// All students listed for `keyword`, across every result page.
    pub async fn search(
        &self,
        cancel: &CancellationToken,
        keyword: &str,
    ) -> Result<Vec<Student>, ScrapeError> {
        let first = self.upstream.get(cancel, &search_path(keyword, 1)).await?;
        let (mut students, pages) = parse_search_page(&first);
        debug!("Keyword {} has {} result page(s)", keyword, pages);

        for page in 2..=pages {
            let next = self.upstream.get(cancel, &search_path(keyword, page)).await?;
            students.extend(parse_search_page(&next).0);
        }

        let mut seen = HashSet::new();
        students.retain(|s| seen.insert(s.id.clone()));
        Ok(students)
    }

    /// One bachelor cohort, e.g. year 112 of department `85`.
    pub async fn cohort(
        &self,
        cancel: &CancellationToken,
        year: u16,
        department_code: &str,
    ) -> Result<Vec<Student>, ScrapeError> {
        self.search(
            cancel,
            &search_keyword(Degree::Bachelor, year, department_code),
        )
        .await
    }

    /// The student with exactly this id, if listed.
    pub async fn by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Option<Student>, ScrapeError> {
        if !is_student_id(id) {
            return Err(ScrapeError::Invalid(format!("not a student id: {}", id)));
        }
        let students = self.search(cancel, id).await?;
        Ok(students.into_iter().find(|s| s.id == id))
    }
}

fn parse_search_page(page: &Page) -> (Vec<Student>, u32) {
    let document = page.html();
    (parse_students(&document), max_page(&document, &PAGER))
}

/// Result tiles in document order.
pub fn parse_students(document: &Html) -> Vec<Student> {
    document
        .select(&TILE)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let id = id_from_href(href)?;
            Student::from_id(id, &element_text(a))
        })
        .collect()
}

/// Last path segment of a tile link, if it is a student id.
fn id_from_href(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    is_student_id(id).then_some(id)
}

//! Academic program listings on the learning-management board.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ScrapeError;
use super::html::{element_text, max_page, query_param, resolve};
use super::http_client::Page;
use super::upstream::Upstream;
use crate::models::{is_discontinued, normalize_program_name, Program};

static DOC_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"tr a[href*="f=doc"]"#).expect("valid selector"));
static PAGER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pagination a, .page a").expect("valid selector"));

/// A board folder holding program documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFolder {
    pub course_id: String,
    pub folder_id: String,
}

impl ProgramFolder {
    /// Parse `courseID:folderID`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (course_id, folder_id) = spec.trim().split_once(':')?;
        if course_id.is_empty() || folder_id.is_empty() {
            return None;
        }
        Some(Self {
            course_id: course_id.to_string(),
            folder_id: folder_id.to_string(),
        })
    }

    pub fn page_path(&self, page: u32) -> String {
        format!(
            "/board.php?courseID={}&f=doclist&folderID={}&page={}",
            self.course_id, self.folder_id, page
        )
    }
}

#[derive(Clone)]
pub struct ProgramScraper {
    upstream: Upstream,
}

impl ProgramScraper {
    pub fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    /// Every live program across `folders`, deduplicated by document id.
    pub async fn crawl(
        &self,
        cancel: &CancellationToken,
        folders: &[ProgramFolder],
    ) -> Result<Vec<Program>, ScrapeError> {
        if folders.is_empty() {
            warn!("No program folders configured (PROGRAM_FOLDERS), program crawl finds nothing");
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut programs = Vec::new();

        for folder in folders {
            let first = self.upstream.get(cancel, &folder.page_path(1)).await?;
            let (found, pages) = parse_folder_page(&first);
            programs.extend(found.into_iter().filter(|p| seen.insert(p.id.clone())));
            debug!("Program folder {} has {} page(s)", folder.folder_id, pages);

            for page in 2..=pages {
                let next = self.upstream.get(cancel, &folder.page_path(page)).await?;
                let (found, _) = parse_folder_page(&next);
                programs.extend(found.into_iter().filter(|p| seen.insert(p.id.clone())));
            }
        }

        Ok(programs)
    }
}

fn parse_folder_page(page: &Page) -> (Vec<Program>, u32) {
    let document = page.html();
    (
        parse_programs(&page.url, &document),
        max_page(&document, &PAGER),
    )
}

/// Program documents on one folder page, discontinued ones dropped.
pub fn parse_programs(page_url: &str, document: &Html) -> Vec<Program> {
    document
        .select(&DOC_LINK)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let id = query_param(href, "cid")?;
            let raw_name = element_text(a);
            if raw_name.is_empty() || is_discontinued(&raw_name) {
                return None;
            }
            Some(Program {
                id,
                name: normalize_program_name(&raw_name),
                url: resolve(page_url, href)?,
                cached_at: 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../../tests/fixtures/programs_folder.html");
    const PAGE: &str = "http://lms.test/board.php?courseID=1&f=doclist&folderID=9&page=1";

    #[test]
    fn test_parses_live_programs() {
        let programs = parse_programs(PAGE, &Html::parse_document(FIXTURE));
        let names: Vec<_> = programs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["人工智慧學程", "智慧財產權學程", "人工智慧學程"]);
        assert_eq!(programs[0].id, "101");
        assert_eq!(
            programs[0].url,
            "http://lms.test/board.php?courseID=1&f=doc&cid=101"
        );
    }

    #[test]
    fn test_pager() {
        let page = Page::new(PAGE, FIXTURE);
        assert_eq!(parse_folder_page(&page).1, 2);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_crawl_without_folders_warns() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // No candidates: any request would fail with NoCandidates
        let upstream = Upstream::new(
            crate::scrapers::HttpClient::new(&Default::default()).unwrap(),
            std::sync::Arc::new(crate::scrapers::UrlCache::new("lms", Vec::new())),
        );
        let programs = ProgramScraper::new(upstream)
            .crawl(&CancellationToken::new(), &[])
            .await
            .unwrap();
        assert!(programs.is_empty());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("PROGRAM_FOLDERS"), "{logs}");
    }

    #[test]
    fn test_folder_spec() {
        let folder = ProgramFolder::parse("28286:1001").unwrap();
        assert_eq!(
            folder.page_path(3),
            "/board.php?courseID=28286&f=doclist&folderID=1001&page=3"
        );
        assert!(ProgramFolder::parse("28286").is_none());
        assert!(ProgramFolder::parse(":1").is_none());
    }
}

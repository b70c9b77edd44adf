//! Production [`CampusSource`] backed by the live campus hosts.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::contacts::{ContactScraper, DirectoryKind};
use super::courses::CourseScraper;
use super::error::ScrapeError;
use super::http_client::HttpClient;
use super::programs::{ProgramFolder, ProgramScraper};
use super::source::CampusSource;
use super::stickers::StickerScraper;
use super::students::StudentScraper;
use super::upstream::Upstream;
use super::url_cache::UrlCache;
use crate::models::{Contact, Course, CourseUid, Program, Semester, Sticker, Student};

/// Learning-management host: portfolios and program boards.
pub const LMS_DOMAIN: &str = "lms";
/// Course query and directory host.
pub const SEA_DOMAIN: &str = "sea";

/// Ordered failover candidates per domain.
pub type Endpoints = BTreeMap<String, Vec<String>>;

/// Adapters bound to their upstream domains.
#[derive(Clone)]
pub struct CampusScraper {
    students: StudentScraper,
    contacts: ContactScraper,
    courses: CourseScraper,
    programs: ProgramScraper,
    stickers: StickerScraper,
    program_folders: Vec<ProgramFolder>,
    url_caches: Vec<Arc<UrlCache>>,
}

impl CampusScraper {
    pub fn new(http: HttpClient, endpoints: &Endpoints, program_folders: Vec<ProgramFolder>) -> Self {
        let cache_for = |domain: &str| {
            Arc::new(UrlCache::new(
                domain,
                endpoints.get(domain).cloned().unwrap_or_default(),
            ))
        };
        let lms = Upstream::new(http.clone(), cache_for(LMS_DOMAIN));
        let sea = Upstream::new(http.clone(), cache_for(SEA_DOMAIN));
        let url_caches = vec![lms.url_cache().clone(), sea.url_cache().clone()];

        Self {
            students: StudentScraper::new(lms.clone()),
            programs: ProgramScraper::new(lms),
            contacts: ContactScraper::new(sea.clone()),
            courses: CourseScraper::new(sea),
            stickers: StickerScraper::new(http),
            program_folders,
            url_caches,
        }
    }

    /// The working-URL cell of every domain.
    pub fn url_caches(&self) -> &[Arc<UrlCache>] {
        &self.url_caches
    }
}

#[async_trait]
impl CampusSource for CampusScraper {
    async fn student_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Option<Student>, ScrapeError> {
        self.students.by_id(cancel, id).await
    }

    async fn students_cohort(
        &self,
        cancel: &CancellationToken,
        year: u16,
        department_code: &str,
    ) -> Result<Vec<Student>, ScrapeError> {
        self.students.cohort(cancel, year, department_code).await
    }

    async fn course_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &CourseUid,
    ) -> Result<Option<Course>, ScrapeError> {
        self.courses.by_uid(cancel, uid).await
    }

    async fn courses_by_title(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        title: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.courses.by_title(cancel, semester, title).await
    }

    async fn courses_by_teacher(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        teacher: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.courses.by_teacher(cancel, semester, teacher).await
    }

    async fn courses_by_code(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        code: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.courses.by_code(cancel, semester, code).await
    }

    async fn directory_links(
        &self,
        cancel: &CancellationToken,
        kind: DirectoryKind,
    ) -> Result<Vec<String>, ScrapeError> {
        self.contacts.directory_links(cancel, kind).await
    }

    async fn contacts_at(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        self.contacts.contacts_at(cancel, path).await
    }

    async fn search_contacts(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        self.contacts.search(cancel, term).await
    }

    async fn programs(&self, cancel: &CancellationToken) -> Result<Vec<Program>, ScrapeError> {
        self.programs.crawl(cancel, &self.program_folders).await
    }

    async fn stickers(
        &self,
        cancel: &CancellationToken,
        source_url: &str,
    ) -> Result<Vec<Sticker>, ScrapeError> {
        self.stickers.fetch(cancel, source_url).await
    }
}

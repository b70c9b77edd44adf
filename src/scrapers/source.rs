//! The adapter seam used by the query facade and the warmup pipeline.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::contacts::DirectoryKind;
use super::error::ScrapeError;
use crate::models::{Contact, Course, CourseUid, Program, Semester, Sticker, Student};

/// Everything the cache can ask the campus upstreams for.
///
/// [`CampusScraper`](super::CampusScraper) is the production implementation;
/// tests substitute counting stubs.
#[async_trait]
pub trait CampusSource: Send + Sync {
    /// The student with exactly this id.
    async fn student_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Option<Student>, ScrapeError>;

    /// Bachelor cohort of `department_code` entering in `year`.
    async fn students_cohort(
        &self,
        cancel: &CancellationToken,
        year: u16,
        department_code: &str,
    ) -> Result<Vec<Student>, ScrapeError>;

    async fn course_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &CourseUid,
    ) -> Result<Option<Course>, ScrapeError>;

    async fn courses_by_title(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        title: &str,
    ) -> Result<Vec<Course>, ScrapeError>;

    async fn courses_by_teacher(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        teacher: &str,
    ) -> Result<Vec<Course>, ScrapeError>;

    /// Courses matching a course number or a bare education code.
    async fn courses_by_code(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        code: &str,
    ) -> Result<Vec<Course>, ScrapeError>;

    /// Organization page paths of one directory listing.
    async fn directory_links(
        &self,
        cancel: &CancellationToken,
        kind: DirectoryKind,
    ) -> Result<Vec<String>, ScrapeError>;

    async fn contacts_at(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Vec<Contact>, ScrapeError>;

    async fn search_contacts(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<Vec<Contact>, ScrapeError>;

    /// All live programs from the configured folders.
    async fn programs(&self, cancel: &CancellationToken) -> Result<Vec<Program>, ScrapeError>;

    async fn stickers(
        &self,
        cancel: &CancellationToken,
        source_url: &str,
    ) -> Result<Vec<Sticker>, ScrapeError>;
}

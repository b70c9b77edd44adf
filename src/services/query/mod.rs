//! Read-through query facade.
//!
//! Every lookup reads the store first. On a miss the matching adapter runs
//! under single-flight, its records are written back, and the typed records
//! are returned. Multi-semester searches are merged and deduplicated by uid.

mod error;
mod intent;

pub use error::QueryError;
pub use intent::{classify, Intent};

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::singleflight::SingleFlight;
use crate::models::{
    campus_today, is_student_id, semesters_for_date, Contact, Course, CourseUid, Program,
    Semester, Student,
};
use crate::repository::{CourseTable, Store};
use crate::scrapers::{CampusSource, ScrapeError};

/// Typed records handed to the formatting layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum Answer {
    Courses(Vec<Course>),
    Students(Vec<Student>),
    Contacts(Vec<Contact>),
    Programs(Vec<Program>),
}

impl Answer {
    pub fn len(&self) -> usize {
        match self {
            Answer::Courses(v) => v.len(),
            Answer::Students(v) => v.len(),
            Answer::Contacts(v) => v.len(),
            Answer::Programs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which course search a flight performs.
#[derive(Debug, Clone, Copy)]
enum CourseSearch {
    Title,
    Teacher,
    Code,
}

impl CourseSearch {
    fn key(&self) -> &'static str {
        match self {
            CourseSearch::Title => "title",
            CourseSearch::Teacher => "teacher",
            CourseSearch::Code => "no",
        }
    }
}

pub struct QueryService {
    store: Store,
    source: Arc<dyn CampusSource>,
    /// Cancels shared scrapes; individual callers only stop waiting.
    shutdown: CancellationToken,
    semesters: Option<[Semester; 2]>,
    course: SingleFlight<Option<Course>>,
    courses: SingleFlight<Vec<Course>>,
    student: SingleFlight<Option<Student>>,
    contacts: SingleFlight<Vec<Contact>>,
    programs: SingleFlight<Vec<Program>>,
}

impl QueryService {
    pub fn new(store: Store, source: Arc<dyn CampusSource>) -> Self {
        Self {
            store,
            source,
            shutdown: CancellationToken::new(),
            semesters: None,
            course: SingleFlight::new(),
            courses: SingleFlight::new(),
            student: SingleFlight::new(),
            contacts: SingleFlight::new(),
            programs: SingleFlight::new(),
        }
    }

    /// Pin the "current" terms instead of deriving them from today's date.
    pub fn with_semesters(mut self, semesters: [Semester; 2]) -> Self {
        self.semesters = Some(semesters);
        self
    }

    /// Token that aborts shared scrapes, e.g. on process shutdown.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Current and previous term, newest first.
    pub fn semesters(&self) -> [Semester; 2] {
        self.semesters
            .unwrap_or_else(|| semesters_for_date(campus_today()))
    }

    /// Terms older than both current terms live in the historical table.
    fn table_for(&self, semester: Semester) -> CourseTable {
        let oldest = self.semesters().into_iter().min().unwrap_or(semester);
        if semester < oldest {
            CourseTable::Historical
        } else {
            CourseTable::Current
        }
    }

    /// Classify `text` and run the matching lookup.
    pub async fn answer(&self, cancel: &CancellationToken, text: &str) -> Result<Answer, QueryError> {
        let intent = classify(text)?;
        debug!("Query {:?} classified as {:?}", text, intent);
        match intent {
            Intent::CourseUid(uid) => self
                .course_by_uid(cancel, &uid)
                .await
                .map(|course| Answer::Courses(vec![course])),
            Intent::CourseNo(no) => self.courses_by_no(cancel, &no).await.map(Answer::Courses),
            Intent::CourseTitle { title, year } => self
                .courses_by_title(cancel, &title, year)
                .await
                .map(Answer::Courses),
            Intent::CourseTeacher { teacher, year } => self
                .courses_by_teacher(cancel, &teacher, year)
                .await
                .map(Answer::Courses),
            Intent::StudentId(id) => self
                .student_by_id(cancel, &id)
                .await
                .map(|student| Answer::Students(vec![student])),
            Intent::StudentName(name) => self.students_by_name(&name).map(Answer::Students),
            Intent::Contact(term) => self.contacts(cancel, &term).await.map(Answer::Contacts),
            Intent::Program(name) => self
                .programs(cancel, name.as_deref())
                .await
                .map(Answer::Programs),
        }
    }

    /// One course by uid. Upstream 404s and unknown uids are [`QueryError::NotFound`].
    pub async fn course_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &CourseUid,
    ) -> Result<Course, QueryError> {
        let table = self.table_for(uid.semester());
        let key = uid.to_string();
        if let Some(course) = self.store.get_course(table, &key)? {
            debug!("Cache hit for course {}", key);
            return Ok(course);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let uid = uid.clone();
        let found = self
            .course
            .run(cancel, &format!("course:uid:{key}"), move || async move {
                let course = source.course_by_uid(&shutdown, &uid).await?;
                Ok(course.and_then(|course| persist_courses(&store, table, vec![course]).pop()))
            })
            .await?;
        found.ok_or(QueryError::NotFound)
    }

    /// Courses with this number in either current term.
    pub async fn courses_by_no(
        &self,
        cancel: &CancellationToken,
        no: &str,
    ) -> Result<Vec<Course>, QueryError> {
        let no = no.trim().to_uppercase();
        let semesters = self.semesters();
        self.search_courses(cancel, CourseSearch::Code, &no, &semesters)
            .await
    }

    /// Courses whose title contains `title`, in the current terms or both
    /// terms of `year`.
    pub async fn courses_by_title(
        &self,
        cancel: &CancellationToken,
        title: &str,
        year: Option<u16>,
    ) -> Result<Vec<Course>, QueryError> {
        let semesters = self.search_semesters(year);
        self.search_courses(cancel, CourseSearch::Title, title, &semesters)
            .await
    }

    pub async fn courses_by_teacher(
        &self,
        cancel: &CancellationToken,
        teacher: &str,
        year: Option<u16>,
    ) -> Result<Vec<Course>, QueryError> {
        let semesters = self.search_semesters(year);
        self.search_courses(cancel, CourseSearch::Teacher, teacher, &semesters)
            .await
    }

    /// Cached courses that belong to a program. Never scrapes.
    pub fn courses_for_program(&self, program: &str) -> Result<Vec<Course>, QueryError> {
        Ok(self.store.courses_for_program(program)?)
    }

    fn search_semesters(&self, year: Option<u16>) -> [Semester; 2] {
        match year {
            Some(year) => [Semester::new(year, 2), Semester::new(year, 1)],
            None => self.semesters(),
        }
    }

    /// Look every term up concurrently and merge what came back.
    ///
    /// Each term is read through on its own: terms with fresh rows in their
    /// table are served from the store, the rest are scraped. Terms that fail
    /// permanently contribute nothing. If no term succeeded a transient
    /// failure becomes [`QueryError::Unavailable`].
    async fn search_courses(
        &self,
        cancel: &CancellationToken,
        search: CourseSearch,
        term: &str,
        semesters: &[Semester],
    ) -> Result<Vec<Course>, QueryError> {
        let lookups = semesters
            .iter()
            .map(|&semester| self.course_term(cancel, search, term, semester));

        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        let mut succeeded = 0;
        let mut failure: Option<QueryError> = None;
        for result in join_all(lookups).await {
            match result {
                Ok(courses) => {
                    succeeded += 1;
                    for course in courses {
                        if seen.insert(course.uid.clone()) {
                            merged.push(course);
                        }
                    }
                }
                Err(QueryError::NotFound) => {}
                Err(err @ (QueryError::Cancelled | QueryError::Storage(_))) => return Err(err),
                Err(err) => {
                    warn!("Course {} search for {:?} failed: {}", search.key(), term, err);
                    failure.get_or_insert(err);
                }
            }
        }

        match failure {
            Some(err) if succeeded == 0 => Err(err),
            _ => Ok(merged),
        }
    }

    /// One term of a course search: fresh rows from the term's table, or a
    /// coalesced scrape written back to that same table.
    async fn course_term(
        &self,
        cancel: &CancellationToken,
        search: CourseSearch,
        term: &str,
        semester: Semester,
    ) -> Result<Vec<Course>, QueryError> {
        let table = self.table_for(semester);
        let only = [semester];
        let cached = match search {
            CourseSearch::Title => self.store.courses_by_title(table, term, &only)?,
            CourseSearch::Teacher => self.store.courses_by_teacher(table, term, &only)?,
            CourseSearch::Code => self.store.courses_by_no(table, term, &only)?,
        };
        if !cached.is_empty() {
            debug!("Cache hit for course {} {:?} in {}", search.key(), term, semester);
            return Ok(cached);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let text = term.to_string();
        let key = format!("course:{}:{}:{}", search.key(), semester, term);
        let scraped = self
            .courses
            .run(cancel, &key, move || async move {
                let courses = match search {
                    CourseSearch::Title => {
                        source.courses_by_title(&shutdown, semester, &text).await
                    }
                    CourseSearch::Teacher => {
                        source.courses_by_teacher(&shutdown, semester, &text).await
                    }
                    CourseSearch::Code => source.courses_by_code(&shutdown, semester, &text).await,
                }?;
                Ok(persist_courses(&store, table, courses))
            })
            .await?;
        Ok(scraped)
    }

    /// One student by id, scraping on a miss.
    pub async fn student_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Student, QueryError> {
        if !is_student_id(id) {
            return Err(QueryError::Invalid(format!("{id:?} is not a student id")));
        }
        if let Some(student) = self.store.get_student(id)? {
            return Ok(student);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let id = id.to_string();
        let found = self
            .student
            .run(cancel, &format!("student:id:{id}"), move || async move {
                let student = source.student_by_id(&shutdown, &id).await?;
                if let Some(student) = &student {
                    if let Err(e) = store.save_students(std::slice::from_ref(student)) {
                        warn!("Failed to cache student {}: {}", student.id, e);
                    }
                }
                Ok(student)
            })
            .await?;
        found.ok_or(QueryError::NotFound)
    }

    /// Cached students whose name contains `name`. Never scrapes.
    pub fn students_by_name(&self, name: &str) -> Result<Vec<Student>, QueryError> {
        Ok(self.store.search_students_by_name(name)?)
    }

    pub async fn contacts(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<Vec<Contact>, QueryError> {
        let cached = self.store.search_contacts(term)?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let text = term.to_string();
        let contacts = self
            .contacts
            .run(cancel, &format!("contact:search:{term}"), move || async move {
                let contacts = source.search_contacts(&shutdown, &text).await?;
                if let Err(e) = store.save_contacts(&contacts) {
                    warn!("Failed to cache {} contacts: {}", contacts.len(), e);
                }
                Ok(contacts)
            })
            .await;
        not_found_as_empty(contacts)
    }

    /// Programs, optionally filtered by name. An empty cache triggers a crawl.
    pub async fn programs(
        &self,
        cancel: &CancellationToken,
        name: Option<&str>,
    ) -> Result<Vec<Program>, QueryError> {
        let cached = match name {
            Some(name) => self.store.search_programs(name)?,
            None => self.store.list_programs()?,
        };
        if !cached.is_empty() {
            return Ok(cached);
        }

        let store = self.store.clone();
        let source = self.source.clone();
        let shutdown = self.shutdown.clone();
        let crawled = self
            .programs
            .run(cancel, "program:all", move || async move {
                let programs = source.programs(&shutdown).await?;
                if let Err(e) = store.save_programs(&programs) {
                    warn!("Failed to cache {} programs: {}", programs.len(), e);
                } else {
                    info!("Cached {} programs", programs.len());
                }
                Ok(programs)
            })
            .await;
        let programs = not_found_as_empty(crawled)?;
        Ok(match name {
            Some(name) => programs
                .into_iter()
                .filter(|p| p.name.contains(name))
                .collect(),
            None => programs,
        })
    }
}

/// Write scraped courses and stamp the returned copies. Write errors are
/// logged; the caller still gets the records.
fn persist_courses(store: &Store, table: CourseTable, mut courses: Vec<Course>) -> Vec<Course> {
    if courses.is_empty() {
        return courses;
    }
    let now = chrono::Utc::now().timestamp();
    for course in &mut courses {
        course.cached_at = now;
    }
    if let Err(e) = store.save_courses(table, &courses) {
        warn!("Failed to cache {} courses: {}", courses.len(), e);
    }
    courses
}

fn not_found_as_empty<T: Default>(
    result: Result<T, Arc<ScrapeError>>,
) -> Result<T, QueryError> {
    match result {
        Ok(records) => Ok(records),
        Err(e) => match QueryError::from(e) {
            QueryError::NotFound => Ok(T::default()),
            err => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::store::fixtures::course;
    use crate::repository::store::test_support::temp_store;
    use crate::scrapers::DirectoryKind;
    use crate::models::Sticker;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers title searches with one course per term; fails term 2 with 503.
    #[derive(Default)]
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CampusSource for FlakySource {
        async fn student_by_id(&self, _: &CancellationToken, _: &str) -> Result<Option<Student>, ScrapeError> {
            Ok(None)
        }
        async fn students_cohort(&self, _: &CancellationToken, _: u16, _: &str) -> Result<Vec<Student>, ScrapeError> {
            Ok(Vec::new())
        }
        async fn course_by_uid(&self, _: &CancellationToken, _: &CourseUid) -> Result<Option<Course>, ScrapeError> {
            Ok(None)
        }
        async fn courses_by_title(
            &self,
            _: &CancellationToken,
            semester: Semester,
            title: &str,
        ) -> Result<Vec<Course>, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if semester.term == 2 {
                return Err(ScrapeError::Status {
                    status: 503,
                    url: "http://sea.test/".to_string(),
                });
            }
            Ok(vec![course(&format!("{}{}U0010", semester.year, semester.term), title)])
        }
        async fn courses_by_teacher(&self, _: &CancellationToken, _: Semester, _: &str) -> Result<Vec<Course>, ScrapeError> {
            Err(ScrapeError::Status {
                status: 503,
                url: "http://sea.test/".to_string(),
            })
        }
        async fn courses_by_code(&self, _: &CancellationToken, _: Semester, _: &str) -> Result<Vec<Course>, ScrapeError> {
            Ok(Vec::new())
        }
        async fn directory_links(&self, _: &CancellationToken, _: DirectoryKind) -> Result<Vec<String>, ScrapeError> {
            Ok(Vec::new())
        }
        async fn contacts_at(&self, _: &CancellationToken, _: &str) -> Result<Vec<Contact>, ScrapeError> {
            Ok(Vec::new())
        }
        async fn search_contacts(&self, _: &CancellationToken, _: &str) -> Result<Vec<Contact>, ScrapeError> {
            Err(ScrapeError::Status {
                status: 404,
                url: "http://sea.test/".to_string(),
            })
        }
        async fn programs(&self, _: &CancellationToken) -> Result<Vec<Program>, ScrapeError> {
            Ok(Vec::new())
        }
        async fn stickers(&self, _: &CancellationToken, _: &str) -> Result<Vec<Sticker>, ScrapeError> {
            Ok(Vec::new())
        }
    }

    fn service(store: Store) -> (Arc<FlakySource>, QueryService) {
        let source = Arc::new(FlakySource::default());
        let service = QueryService::new(store, source.clone())
            .with_semesters([Semester::new(114, 2), Semester::new(114, 1)]);
        (source, service)
    }

    #[tokio::test]
    async fn test_partial_term_failure_still_answers() {
        let (_dir, store) = temp_store();
        let (source, service) = service(store);
        let cancel = CancellationToken::new();

        let courses = service.courses_by_title(&cancel, "線性代數", None).await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].uid, "1141U0010");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // 114-1 is served from the store, the failed 114-2 is retried
        let again = service.courses_by_title(&cancel, "線性代數", None).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_terms_transient_is_unavailable() {
        let (_dir, store) = temp_store();
        let (_, service) = service(store);
        let err = service
            .courses_by_teacher(&CancellationToken::new(), "王小明", None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_old_year_uses_historical_table() {
        let (_dir, store) = temp_store();
        let (_, service) = service(store.clone());
        let courses = service
            .courses_by_title(&CancellationToken::new(), "微積分", Some(110))
            .await
            .unwrap();
        assert_eq!(courses[0].uid, "1101U0010");
        assert!(store
            .get_course(CourseTable::Historical, "1101U0010")
            .unwrap()
            .is_some());
        assert!(store
            .get_course(CourseTable::Current, "1101U0010")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_contact_not_found_is_empty() {
        let (_dir, store) = temp_store();
        let (_, service) = service(store);
        let contacts = service
            .contacts(&CancellationToken::new(), "不存在的單位")
            .await
            .unwrap();
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn test_answer_rejects_bad_student_id() {
        let (_dir, store) = temp_store();
        let (_, service) = service(store);
        let err = service
            .student_by_id(&CancellationToken::new(), "4112")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_answer_serializes_with_kind_tag() {
        let (_dir, store) = temp_store();
        store
            .save_courses(CourseTable::Current, &[course("1141U0010", "資料結構")])
            .unwrap();
        let (_, service) = service(store);
        let answer = service
            .answer(&CancellationToken::new(), "1141U0010")
            .await
            .unwrap();
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["kind"], "courses");
        assert_eq!(json["records"][0]["title"], "資料結構");
    }
}

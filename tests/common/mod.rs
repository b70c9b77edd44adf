//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use campus_cache::models::{
    Contact, Course, CourseUid, Program, Semester, Sticker, Student,
};
use campus_cache::repository::Store;
use campus_cache::scrapers::{
    CampusSource, DirectoryKind, HttpClient, HttpConfig, RetryPolicy, ScrapeError,
};

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn spawn_host(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Client with fast retries so tests stay quick.
pub fn fast_client(max_retries: u32) -> HttpClient {
    HttpClient::new(&HttpConfig {
        timeout: Duration::from_secs(5),
        probe_timeout: Duration::from_secs(2),
        retry: RetryPolicy::new(max_retries, Duration::from_millis(10)),
        ..HttpConfig::default()
    })
    .unwrap()
}

pub fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("cache.db")).unwrap();
    (dir, store)
}

pub fn course(uid: &str, title: &str) -> Course {
    let parsed: CourseUid = uid.parse().unwrap();
    Course {
        uid: uid.to_string(),
        year: parsed.year,
        term: parsed.term,
        no: parsed.no,
        title: title.to_string(),
        teachers: vec!["陳老師".to_string()],
        teacher_urls: vec!["https://sea.test/teacher/1".to_string()],
        times: vec!["每週三3~4".to_string()],
        locations: vec!["電4F01".to_string()],
        detail_url: String::new(),
        note: String::new(),
        programs: Vec::new(),
        cached_at: 0,
    }
}

fn unavailable() -> ScrapeError {
    ScrapeError::Status {
        status: 503,
        url: "http://stub.test/".to_string(),
    }
}

fn missing() -> ScrapeError {
    ScrapeError::Status {
        status: 404,
        url: "http://stub.test/".to_string(),
    }
}

/// Deterministic in-memory source that counts adapter calls.
#[derive(Default)]
pub struct StubSource {
    pub calls: AtomicUsize,
    /// Pause inside every call, to widen race windows or trip timeouts.
    pub delay: Duration,
    /// Cohort lookups for this department fail with 503.
    pub failing_department: Option<String>,
}

impl StubSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, cancel: &CancellationToken) -> Result<(), ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        Ok(())
    }
}

/// Three students of one cohort, e.g. `411385001`.
pub fn cohort(year: u16, department: &str) -> Vec<Student> {
    let base = format!("4{year:03}{department}");
    (1..=3)
        .filter_map(|i| {
            let id = format!("{base}{i:0width$}", width = 9 - base.len());
            Student::from_id(&id, &format!("學生{i}"))
        })
        .collect()
}

#[async_trait]
impl CampusSource for StubSource {
    async fn student_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<Option<Student>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(Student::from_id(id, "王小明"))
    }

    async fn students_cohort(
        &self,
        cancel: &CancellationToken,
        year: u16,
        department_code: &str,
    ) -> Result<Vec<Student>, ScrapeError> {
        self.enter(cancel).await?;
        if self.failing_department.as_deref() == Some(department_code) {
            return Err(unavailable());
        }
        Ok(cohort(year, department_code))
    }

    async fn course_by_uid(
        &self,
        cancel: &CancellationToken,
        uid: &CourseUid,
    ) -> Result<Option<Course>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(Some(course(&uid.to_string(), "資料結構")))
    }

    async fn courses_by_title(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        title: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(vec![course(
            &format!("{}{}U0100", semester.year, semester.term),
            title,
        )])
    }

    async fn courses_by_teacher(
        &self,
        cancel: &CancellationToken,
        _semester: Semester,
        _teacher: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(Vec::new())
    }

    async fn courses_by_code(
        &self,
        cancel: &CancellationToken,
        semester: Semester,
        code: &str,
    ) -> Result<Vec<Course>, ScrapeError> {
        self.enter(cancel).await?;
        Ok((1..=2)
            .map(|i| {
                course(
                    &format!("{}{}{}{:04}", semester.year, semester.term, code, i),
                    "通識",
                )
            })
            .collect())
    }

    async fn directory_links(
        &self,
        cancel: &CancellationToken,
        kind: DirectoryKind,
    ) -> Result<Vec<String>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(["a", "b", "gone"]
            .iter()
            .map(|org| format!("/pls/ld/CAMPUS_DIR_M.p2?kind={}&org={}", kind.label(), org))
            .collect())
    }

    async fn contacts_at(
        &self,
        cancel: &CancellationToken,
        path: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        self.enter(cancel).await?;
        if path.ends_with("gone") {
            return Err(missing());
        }
        let org = path.rsplit('?').next().unwrap_or(path);
        Ok(vec![
            Contact::organization(org),
            Contact::individual(org, "林秘書"),
        ])
    }

    async fn search_contacts(
        &self,
        cancel: &CancellationToken,
        term: &str,
    ) -> Result<Vec<Contact>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(vec![Contact::organization(term)])
    }

    async fn programs(&self, cancel: &CancellationToken) -> Result<Vec<Program>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(Vec::new())
    }

    async fn stickers(
        &self,
        cancel: &CancellationToken,
        source_url: &str,
    ) -> Result<Vec<Sticker>, ScrapeError> {
        self.enter(cancel).await?;
        Ok(vec![
            Sticker::new(&format!("{source_url}/1.png"), "stickers.test"),
            Sticker::new(&format!("{source_url}/2.png"), "stickers.test"),
        ])
    }
}

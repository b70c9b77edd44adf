//! SQLite-backed cache of scraped records.

mod contacts;
mod courses;
mod helpers;
mod programs;
mod stickers;
mod students;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::Result;

pub use courses::CourseTable;
#[cfg(test)]
pub(crate) use courses::fixtures;

/// Default freshness window for every table except historical courses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default freshness window for on-demand historical course lookups.
pub const DEFAULT_HISTORICAL_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub students: u64,
    pub contacts: u64,
    pub courses: u64,
    pub historical_courses: u64,
    pub stickers: u64,
    pub programs: u64,
}

impl StoreCounts {
    pub fn total(&self) -> u64 {
        self.students
            + self.contacts
            + self.courses
            + self.historical_courses
            + self.stickers
            + self.programs
    }
}

/// SQLite-backed record cache.
///
/// Each operation opens its own connection, so a `Store` can be cloned into
/// as many tasks as needed. Writes to the same key are last-write-wins.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    ttl: Duration,
    historical_ttl: Duration,
}

impl Store {
    /// Open (and create if needed) the cache at `db_path`.
    pub fn new(db_path: &Path, ttl: Duration, historical_ttl: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
            ttl,
            historical_ttl,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open with the default TTLs.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::new(db_path, DEFAULT_TTL, DEFAULT_HISTORICAL_TTL)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn connect(&self) -> Result<rusqlite::Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS students (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                year INTEGER NOT NULL,
                department TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_students_year_department
                ON students(year, department);
            CREATE INDEX IF NOT EXISTS idx_students_name ON students(name);

            CREATE TABLE IF NOT EXISTS contacts (
                uid TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                name TEXT NOT NULL,
                name_en TEXT NOT NULL DEFAULT '',
                organization TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                extension TEXT NOT NULL DEFAULT '',
                phone TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                superior TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                website TEXT NOT NULL DEFAULT '',
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contacts_name ON contacts(name);

            CREATE TABLE IF NOT EXISTS courses (
                uid TEXT PRIMARY KEY,
                year INTEGER NOT NULL,
                term INTEGER NOT NULL,
                no TEXT NOT NULL,
                title TEXT NOT NULL,
                teachers TEXT NOT NULL DEFAULT '[]',
                teacher_urls TEXT NOT NULL DEFAULT '[]',
                times TEXT NOT NULL DEFAULT '[]',
                locations TEXT NOT NULL DEFAULT '[]',
                detail_url TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                programs TEXT NOT NULL DEFAULT '[]',
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_courses_semester ON courses(year, term);
            CREATE INDEX IF NOT EXISTS idx_courses_title ON courses(title);

            CREATE TABLE IF NOT EXISTS historical_courses (
                uid TEXT PRIMARY KEY,
                year INTEGER NOT NULL,
                term INTEGER NOT NULL,
                no TEXT NOT NULL,
                title TEXT NOT NULL,
                teachers TEXT NOT NULL DEFAULT '[]',
                teacher_urls TEXT NOT NULL DEFAULT '[]',
                times TEXT NOT NULL DEFAULT '[]',
                locations TEXT NOT NULL DEFAULT '[]',
                detail_url TEXT NOT NULL DEFAULT '',
                note TEXT NOT NULL DEFAULT '',
                programs TEXT NOT NULL DEFAULT '[]',
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_historical_courses_semester
                ON historical_courses(year, term);
            CREATE INDEX IF NOT EXISTS idx_historical_courses_title
                ON historical_courses(title);

            CREATE TABLE IF NOT EXISTS stickers (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                source TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS programs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_programs_name ON programs(name);
        "#,
        )?;
        Ok(())
    }

    /// Delete every cached row. Used by `warmup --reset` and `purge`.
    pub fn purge_all(&self) -> Result<StoreCounts> {
        let before = self.counts()?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM students;
            DELETE FROM contacts;
            DELETE FROM courses;
            DELETE FROM historical_courses;
            DELETE FROM stickers;
            DELETE FROM programs;
        "#,
        )?;
        tx.commit()?;
        Ok(before)
    }

    /// Row counts per table, fresh or not.
    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.connect()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        };

        Ok(StoreCounts {
            students: count("students")?,
            contacts: count("contacts")?,
            courses: count("courses")?,
            historical_courses: count("historical_courses")?,
            stickers: count("stickers")?,
            programs: count("programs")?,
        })
    }

    /// Oldest `cached_at` still considered fresh.
    fn fresh_since(&self) -> i64 {
        now() - self.ttl.as_secs() as i64
    }

    fn fresh_since_for(&self, table: CourseTable) -> i64 {
        match table {
            CourseTable::Current => self.fresh_since(),
            CourseTable::Historical => now() - self.historical_ttl.as_secs() as i64,
        }
    }
}

/// Wall-clock seconds used for `cached_at`.
pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}

//! Course rows, current and historical.

use rusqlite::{params, Transaction};

use super::helpers::{like_pattern, row_to_course};
use super::{now, Result, Store};
use crate::models::{Course, Semester};

/// Which course table a query reads and writes.
///
/// The warmup corpus lives in `courses`; on-demand lookups of older years go
/// to `historical_courses`, which has its own TTL. The two never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseTable {
    Current,
    Historical,
}

impl CourseTable {
    fn name(&self) -> &'static str {
        match self {
            CourseTable::Current => "courses",
            CourseTable::Historical => "historical_courses",
        }
    }
}

impl Store {
    pub fn save_courses(&self, table: CourseTable, courses: &[Course]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        insert_courses(&tx, table, courses, now())?;
        tx.commit()?;
        Ok(courses.len())
    }

    pub fn get_course(&self, table: CourseTable, uid: &str) -> Result<Option<Course>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE uid = ?1 AND cached_at >= ?2",
            table.name()
        ))?;
        super::super::to_option(
            stmt.query_row(params![uid, self.fresh_since_for(table)], row_to_course),
        )
    }

    /// Fresh courses whose title contains `title`, restricted to `semesters`
    /// when non-empty.
    pub fn courses_by_title(
        &self,
        table: CourseTable,
        title: &str,
        semesters: &[Semester],
    ) -> Result<Vec<Course>> {
        self.search_courses(table, "title", title, semesters)
    }

    /// Fresh courses taught by someone whose name contains `teacher`.
    pub fn courses_by_teacher(
        &self,
        table: CourseTable,
        teacher: &str,
        semesters: &[Semester],
    ) -> Result<Vec<Course>> {
        self.search_courses(table, "teachers", teacher, semesters)
    }

    /// Fresh courses with this course number.
    pub fn courses_by_no(
        &self,
        table: CourseTable,
        no: &str,
        semesters: &[Semester],
    ) -> Result<Vec<Course>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE no = ?1 AND cached_at >= ?2 ORDER BY year DESC, term DESC",
            table.name()
        ))?;
        let courses = stmt
            .query_map(params![no, self.fresh_since_for(table)], row_to_course)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(in_semesters(courses, semesters))
    }

    /// Fresh current courses that count towards the named program.
    pub fn courses_for_program(&self, program: &str) -> Result<Vec<Course>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM courses
            WHERE programs LIKE ?1 ESCAPE '\' AND cached_at >= ?2
            ORDER BY year DESC, term DESC, no
            "#,
        )?;
        let courses = stmt
            .query_map(params![like_pattern(program), self.fresh_since()], row_to_course)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // The LIKE is a prefilter over the JSON text
        Ok(courses
            .into_iter()
            .filter(|c| c.programs.iter().any(|p| p.name.contains(program)))
            .collect())
    }

    fn search_courses(
        &self,
        table: CourseTable,
        column: &str,
        term: &str,
        semesters: &[Semester],
    ) -> Result<Vec<Course>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT * FROM {}
            WHERE {} LIKE ?1 ESCAPE '\' AND cached_at >= ?2
            ORDER BY year DESC, term DESC, no
            "#,
            table.name(),
            column
        ))?;
        let courses = stmt
            .query_map(
                params![like_pattern(term), self.fresh_since_for(table)],
                row_to_course,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(in_semesters(courses, semesters))
    }
}

fn in_semesters(courses: Vec<Course>, semesters: &[Semester]) -> Vec<Course> {
    if semesters.is_empty() {
        return courses;
    }
    courses
        .into_iter()
        .filter(|c| semesters.contains(&c.semester()))
        .collect()
}

fn insert_courses(
    tx: &Transaction,
    table: CourseTable,
    courses: &[Course],
    cached_at: i64,
) -> Result<()> {
    let mut stmt = tx.prepare(&format!(
        r#"
        INSERT OR REPLACE INTO {} (
            uid, year, term, no, title, teachers, teacher_urls, times,
            locations, detail_url, note, programs, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        table.name()
    ))?;

    for c in courses {
        stmt.execute(params![
            c.uid,
            c.year,
            c.term,
            c.no,
            c.title,
            serde_json::to_string(&c.teachers)?,
            serde_json::to_string(&c.teacher_urls)?,
            serde_json::to_string(&c.times)?,
            serde_json::to_string(&c.locations)?,
            c.detail_url,
            c.note,
            serde_json::to_string(&c.programs)?,
            cached_at,
        ])?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Course, CourseProgram};

    pub fn course(uid: &str, title: &str) -> Course {
        let parsed: crate::models::CourseUid = uid.parse().unwrap();
        Course {
            uid: uid.to_string(),
            year: parsed.year,
            term: parsed.term,
            no: parsed.no,
            title: title.to_string(),
            teachers: vec!["林老師".to_string()],
            teacher_urls: vec!["https://example.test/t/1".to_string()],
            times: vec!["每週一2~4".to_string()],
            locations: vec!["商1F01".to_string()],
            detail_url: "https://example.test/syllabus".to_string(),
            note: String::new(),
            programs: vec![CourseProgram {
                name: "資訊科技學程".to_string(),
                course_type: "選".to_string(),
            }],
            cached_at: 0,
        }
    }
}

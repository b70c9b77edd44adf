//! Student rows.

use rusqlite::params;

use super::helpers::{like_pattern, row_to_student};
use super::{now, Result, Store};
use crate::models::Student;

impl Store {
    /// Insert or replace students, stamping them with the current time.
    pub fn save_students(&self, students: &[Student]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let cached_at = now();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO students (id, name, year, department, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for s in students {
                stmt.execute(params![s.id, s.name, s.year, s.department, cached_at])?;
            }
        }
        tx.commit()?;
        Ok(students.len())
    }

    /// Fresh student by id.
    pub fn get_student(&self, id: &str) -> Result<Option<Student>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM students WHERE id = ?1 AND cached_at >= ?2")?;
        super::super::to_option(stmt.query_row(params![id, self.fresh_since()], row_to_student))
    }

    /// Fresh students whose name contains `name`.
    pub fn search_students_by_name(&self, name: &str) -> Result<Vec<Student>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM students
            WHERE name LIKE ?1 ESCAPE '\' AND cached_at >= ?2
            ORDER BY year DESC, id
            "#,
        )?;
        let students = stmt
            .query_map(params![like_pattern(name), self.fresh_since()], row_to_student)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(students)
    }

    /// Fresh students of one cohort.
    pub fn list_students(&self, year: u16, department: &str) -> Result<Vec<Student>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM students
            WHERE year = ?1 AND department = ?2 AND cached_at >= ?3
            ORDER BY id
            "#,
        )?;
        let students = stmt
            .query_map(params![year, department, self.fresh_since()], row_to_student)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(students)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_store;
    use super::*;
    use rusqlite::params;

    fn student(id: &str, name: &str) -> Student {
        Student::from_id(id, name).unwrap()
    }

    #[test]
    fn test_save_and_get() {
        let (_dir, store) = temp_store();
        store.save_students(&[student("411285001", "王小明")]).unwrap();

        let got = store.get_student("411285001").unwrap().unwrap();
        assert_eq!(got.name, "王小明");
        assert_eq!(got.year, 112);
        assert_eq!(got.department, "資訊工程學系");
        assert!((got.cached_at - now()).abs() <= 1);
        assert!(store.get_student("411285002").unwrap().is_none());
    }

    #[test]
    fn test_resave_replaces_row() {
        let (_dir, store) = temp_store();
        store.save_students(&[student("411285001", "王小明")]).unwrap();
        store.save_students(&[student("411285001", "王大明")]).unwrap();

        assert_eq!(store.counts().unwrap().students, 1);
        assert_eq!(store.get_student("411285001").unwrap().unwrap().name, "王大明");
    }

    #[test]
    fn test_stale_rows_are_misses() {
        let (_dir, store) = temp_store();
        store.save_students(&[student("411285001", "王小明")]).unwrap();
        let stale = now() - store.ttl().as_secs() as i64 - 10;
        store
            .connect()
            .unwrap()
            .execute("UPDATE students SET cached_at = ?1", params![stale])
            .unwrap();

        assert!(store.get_student("411285001").unwrap().is_none());
        assert!(store.search_students_by_name("王").unwrap().is_empty());
        assert_eq!(store.counts().unwrap().students, 1);
    }

    #[test]
    fn test_search_and_list() {
        let (_dir, store) = temp_store();
        store
            .save_students(&[
                student("411285001", "王小明"),
                student("411285002", "李小華"),
                student("411085003", "王大同"),
            ])
            .unwrap();

        let wangs = store.search_students_by_name("王").unwrap();
        assert_eq!(
            wangs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            ["411285001", "411085003"]
        );
        assert_eq!(store.list_students(112, "資訊工程學系").unwrap().len(), 2);
    }
}

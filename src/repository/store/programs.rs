//! Academic program rows.

use rusqlite::params;

use super::helpers::{like_pattern, row_to_program};
use super::{now, Result, Store};
use crate::models::Program;

impl Store {
    pub fn save_programs(&self, programs: &[Program]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let cached_at = now();
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO programs (id, name, url, cached_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in programs {
                stmt.execute(params![p.id, p.name, p.url, cached_at])?;
            }
        }
        tx.commit()?;
        Ok(programs.len())
    }

    pub fn list_programs(&self) -> Result<Vec<Program>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM programs WHERE cached_at >= ?1 ORDER BY name")?;
        let programs = stmt
            .query_map(params![self.fresh_since()], row_to_program)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(programs)
    }

    pub fn search_programs(&self, name: &str) -> Result<Vec<Program>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM programs WHERE name LIKE ?1 ESCAPE '\\' AND cached_at >= ?2 ORDER BY name",
        )?;
        let programs = stmt
            .query_map(params![like_pattern(name), self.fresh_since()], row_to_program)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(programs)
    }
}

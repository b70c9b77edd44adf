//! Directory contact rows.

use rusqlite::params;

use super::helpers::{like_pattern, row_to_contact};
use super::{now, Result, Store};
use crate::models::Contact;

impl Store {
    pub fn save_contacts(&self, contacts: &[Contact]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let cached_at = now();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO contacts (
                    uid, type, name, name_en, organization, title, extension,
                    phone, email, superior, location, website, cached_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )?;
            for c in contacts {
                stmt.execute(params![
                    c.uid,
                    c.kind.as_str(),
                    c.name,
                    c.name_en,
                    c.organization,
                    c.title,
                    c.extension,
                    c.phone,
                    c.email,
                    c.superior,
                    c.location,
                    c.website,
                    cached_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(contacts.len())
    }

    pub fn get_contact(&self, uid: &str) -> Result<Option<Contact>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM contacts WHERE uid = ?1 AND cached_at >= ?2")?;
        super::super::to_option(stmt.query_row(params![uid, self.fresh_since()], row_to_contact))
    }

    /// Fresh contacts whose name, English name or organization contains
    /// `term`. Organizations sort before people.
    pub fn search_contacts(&self, term: &str) -> Result<Vec<Contact>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM contacts
            WHERE (name LIKE ?1 ESCAPE '\'
                   OR name_en LIKE ?1 ESCAPE '\'
                   OR organization LIKE ?1 ESCAPE '\')
              AND cached_at >= ?2
            ORDER BY CASE type WHEN 'organization' THEN 0 ELSE 1 END, organization, name
            "#,
        )?;
        let contacts = stmt
            .query_map(params![like_pattern(term), self.fresh_since()], row_to_contact)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contacts)
    }
}

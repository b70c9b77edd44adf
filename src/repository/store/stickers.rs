//! Sticker rows.

use rusqlite::params;

use super::helpers::row_to_sticker;
use super::{now, Result, Store};
use crate::models::Sticker;

impl Store {
    pub fn save_stickers(&self, stickers: &[Sticker]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let cached_at = now();
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO stickers (id, url, source, cached_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for s in stickers {
                stmt.execute(params![s.id, s.url, s.source, cached_at])?;
            }
        }
        tx.commit()?;
        Ok(stickers.len())
    }

    /// Fresh stickers, optionally from one source only.
    pub fn list_stickers(&self, source: Option<&str>) -> Result<Vec<Sticker>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM stickers
            WHERE (?1 IS NULL OR source = ?1) AND cached_at >= ?2
            ORDER BY source, id
            "#,
        )?;
        let stickers = stmt
            .query_map(params![source, self.fresh_since()], row_to_sticker)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stickers)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_store;
    use super::*;

    #[test]
    fn test_list_by_source() {
        let (_dir, store) = temp_store();
        store
            .save_stickers(&[
                Sticker::new("https://a.test/1.png", "a.test"),
                Sticker::new("https://a.test/2.png", "a.test"),
                Sticker::new("https://b.test/1.png", "b.test"),
            ])
            .unwrap();

        assert_eq!(store.list_stickers(None).unwrap().len(), 3);
        assert_eq!(store.list_stickers(Some("a.test")).unwrap().len(), 2);
        assert!(store.list_stickers(Some("c.test")).unwrap().is_empty());
    }
}

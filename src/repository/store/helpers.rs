//! Row mapping helpers shared by the store's table modules.

use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

use crate::models::{Contact, ContactKind, Course, Program, Sticker, Student};

/// Decode a JSON text column. A corrupt value is a conversion error.
pub(super) fn from_json<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

/// Wrap a user term for `LIKE ... ESCAPE '\'`.
pub(super) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub(super) fn row_to_student(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get("id")?,
        name: row.get("name")?,
        year: row.get("year")?,
        department: row.get("department")?,
        cached_at: row.get("cached_at")?,
    })
}

pub(super) fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
    Ok(Contact {
        uid: row.get("uid")?,
        kind: ContactKind::from_str(&row.get::<_, String>("type")?)
            .unwrap_or(ContactKind::Individual),
        name: row.get("name")?,
        name_en: row.get("name_en")?,
        organization: row.get("organization")?,
        title: row.get("title")?,
        extension: row.get("extension")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        superior: row.get("superior")?,
        location: row.get("location")?,
        website: row.get("website")?,
        cached_at: row.get("cached_at")?,
    })
}

pub(super) fn row_to_course(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        uid: row.get("uid")?,
        year: row.get("year")?,
        term: row.get("term")?,
        no: row.get("no")?,
        title: row.get("title")?,
        teachers: from_json(row, "teachers")?,
        teacher_urls: from_json(row, "teacher_urls")?,
        times: from_json(row, "times")?,
        locations: from_json(row, "locations")?,
        detail_url: row.get("detail_url")?,
        note: row.get("note")?,
        programs: from_json(row, "programs")?,
        cached_at: row.get("cached_at")?,
    })
}

pub(super) fn row_to_sticker(row: &Row) -> rusqlite::Result<Sticker> {
    Ok(Sticker {
        id: row.get("id")?,
        url: row.get("url")?,
        source: row.get("source")?,
        cached_at: row.get("cached_at")?,
    })
}

pub(super) fn row_to_program(row: &Row) -> rusqlite::Result<Program> {
    Ok(Program {
        id: row.get("id")?,
        name: row.get("name")?,
        url: row.get("url")?,
        cached_at: row.get("cached_at")?,
    })
}

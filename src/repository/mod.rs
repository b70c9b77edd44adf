//! Repository layer for the local SQLite cache.
//!
//! Every record kind lives in one table keyed by its uid/id. Saves replace
//! whole rows; reads only return rows younger than the configured TTL.

pub(crate) mod store;

pub use store::{CourseTable, Store, StoreCounts, DEFAULT_HISTORICAL_TTL, DEFAULT_TTL};

use std::path::Path;

use rusqlite::Connection;
use thiserror::Error;

/// Errors raised by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("cannot encode column: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot create database directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Open a connection with concurrency settings suitable for many short-lived
/// readers and writers.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 30000;
    "#,
    )?;
    Ok(conn)
}

/// Map "no rows" to `None`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

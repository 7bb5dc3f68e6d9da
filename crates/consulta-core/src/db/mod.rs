//! Database layer: the two collections behind the archive.

mod conversations;
mod profiles;
mod schema;

pub use conversations::*;
pub use profiles::*;
pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    Duplicate(String),

    #[error("Stored list column failed to parse for record {id}: {source}")]
    ListRoundTrip {
        id: String,
        source: serde_json::Error,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction without exclusive access to the connection.
    /// Callers must not start a second one before this commits or drops.
    pub fn transaction(&self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// On-disk size of the store, in bytes. Works for in-memory databases
    /// too, where it reports the page-backed size.
    pub fn storage_size_bytes(&self) -> DbResult<u64> {
        let page_count: u64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: u64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }
}

/// Map a primary-key collision onto [`DbError::Duplicate`] for `id`.
pub(crate) fn map_insert_err(err: rusqlite::Error, id: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Duplicate(id.to_owned())
        }
        _ => DbError::Sqlite(err),
    }
}

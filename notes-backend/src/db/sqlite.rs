//! Embedded backend: a single SQLite file behind an r2d2 connection pool.
//!
//! rusqlite is blocking, so each operation checks a connection out of the pool
//! and runs on Tokio's blocking thread pool.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{NoteStore, StoreError};
use crate::models::{Note, NoteDraft};

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const SELECT_COLUMNS: &str = "SELECT id, title, content, created_at, updated_at FROM notes";

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
        });

        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        Ok(Self { pool })
    }

    /// Check out a connection and run `op` on the blocking pool.
    /// The connection is returned to the pool when `op` finishes.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let conn = pool.get()?;
            Ok(op(&conn)?)
        })
        .await?
    }
}

#[async_trait]
impl NoteStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute(SCHEMA, []).map(|_| ()))
            .await
    }

    async fn list_notes(&self) -> Result<Vec<Note>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY updated_at DESC", SELECT_COLUMNS))?;
            let rows = stmt.query_map([], note_from_row)?;
            rows.collect()
        })
        .await
    }

    async fn get_note(&self, id: &str) -> Result<Option<Note>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                note_from_row,
            )
            .optional()
        })
        .await
    }

    async fn create_note(&self, note: &Note) -> Result<(), StoreError> {
        let note = note.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO notes (id, title, content, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    note.id,
                    note.title,
                    note.content,
                    format_timestamp(&note.created_at),
                    format_timestamp(&note.updated_at),
                ],
            )
            .map(|_| ())
        })
        .await
    }

    async fn update_note(
        &self,
        id: &str,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let id = id.to_string();
        let draft = draft.clone();
        self.with_conn(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE notes SET title = ?1, content = ?2, updated_at = MAX(?3, created_at) \
                 WHERE id = ?4",
                params![draft.title(), draft.content(), format_timestamp(&updated_at), id],
            )?;
            Ok(rows_affected > 0)
        })
        .await
    }

    async fn delete_note(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let rows_affected = conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
            Ok(rows_affected > 0)
        })
        .await
    }
}

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: parse_timestamp(row, 3)?,
        updated_at: parse_timestamp(row, 4)?,
    })
}

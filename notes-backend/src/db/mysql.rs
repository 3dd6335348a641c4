//! Networked backend: MySQL through an sqlx connection pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Connection, Row};

use super::{NoteStore, StoreError};
use crate::config::MySqlConfig;
use crate::models::{Note, NoteDraft};

// No ON UPDATE CURRENT_TIMESTAMP: updated_at is always written by the service.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS notes (
    id VARCHAR(36) PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    content LONGTEXT NOT NULL,
    created_at TIMESTAMP(6) NOT NULL,
    updated_at TIMESTAMP(6) NOT NULL
)";

const SELECT_COLUMNS: &str = "SELECT id, title, content, created_at, updated_at FROM notes";

// updated_at is clamped so a clock stepping backwards never precedes created_at
const UPDATE_SQL: &str = "UPDATE notes SET title = ?, content = ?, \
                          updated_at = GREATEST(?, created_at) WHERE id = ?";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Create the database if it is missing, then open a pool against it.
    pub async fn connect(config: &MySqlConfig, pool_size: u32) -> Result<Self, StoreError> {
        let server = server_options(config);

        let mut conn = MySqlConnection::connect_with(&server).await?;
        sqlx::query(&create_database_sql(&config.database))
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        log::info!(
            "[DB] Connecting MySQL pool to {}:{}/{} (max {} connections)",
            config.host,
            config.port,
            config.database,
            pool_size
        );

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .connect_with(server.database(&config.database))
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl NoteStore for MySqlStore {
    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_notes(&self) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query(&format!("{} ORDER BY updated_at DESC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| note_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn get_note(&self, id: &str) -> Result<Option<Note>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(note_from_row).transpose()?)
    }

    async fn create_note(&self, note: &Note) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notes (id, title, content, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&note.id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_note(
        &self,
        id: &str,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // sqlx connects with CLIENT_FOUND_ROWS, so an unchanged row still counts
        let result = sqlx::query(UPDATE_SQL)
            .bind(draft.title())
            .bind(draft.content())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_note(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Options for the server itself, without selecting a database
fn server_options(config: &MySqlConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
}

fn create_database_sql(database: &str) -> String {
    format!(
        "CREATE DATABASE IF NOT EXISTS `{}`",
        database.replace('`', "``")
    )
}

fn note_from_row(row: &MySqlRow) -> Result<Note, sqlx::Error> {
    Ok(Note {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

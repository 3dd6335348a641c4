//! Storage abstraction shared by the embedded and networked backends.
//!
//! Every method runs exactly one SQL statement on one pooled connection; the
//! connection goes back to the pool when the call returns, whatever the result.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{MySqlStore, SqliteStore};
use crate::config::{Config, StorageBackend};
use crate::models::{Note, NoteDraft};

/// Any failure surfaced by a storage backend.
///
/// Displays as the underlying driver message, which is what clients see in
/// the `error` field of a 500 response.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    MySql(#[from] sqlx::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Short backend name for logs ("sqlite", "mysql")
    fn backend_name(&self) -> &'static str;

    /// Create the `notes` table if it does not exist yet
    async fn init_schema(&self) -> Result<(), StoreError>;

    /// All notes, most recently updated first
    async fn list_notes(&self) -> Result<Vec<Note>, StoreError>;

    async fn get_note(&self, id: &str) -> Result<Option<Note>, StoreError>;

    /// Insert a new note. Fails rather than overwriting if the id is taken.
    async fn create_note(&self, note: &Note) -> Result<(), StoreError>;

    /// Overwrite title and content and set `updated_at`.
    /// Returns false when no note has this id.
    async fn update_note(
        &self,
        id: &str,
        draft: &NoteDraft,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns false when no note has this id.
    async fn delete_note(&self, id: &str) -> Result<bool, StoreError>;
}

/// Open the backend selected in `config` and make sure the schema exists.
pub async fn open_store(config: &Config) -> Result<Arc<dyn NoteStore>, StoreError> {
    let store: Arc<dyn NoteStore> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.db_path, config.pool_size)?),
        StorageBackend::MySql => {
            Arc::new(MySqlStore::connect(&config.mysql, config.pool_size).await?)
        }
    };

    store.init_schema().await?;
    log::info!("[DB] {} schema initialized", store.backend_name());

    Ok(store)
}

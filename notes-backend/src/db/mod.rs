pub mod mysql;
pub mod sqlite;
pub mod store;

pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;
pub use store::{open_store, NoteStore, StoreError};

//! # Local Database Module
//!
//! Local SQLite storage for state that must survive a restart. Today that is
//! the offline send queue; see `sync.rs`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orangecat_chat::client::local_db::LocalDatabase;
//!
//! # async fn example() -> Result<(), orangecat_chat::client::ClientError> {
//! let db = LocalDatabase::open(LocalDatabase::default_path()).await?;
//! let queued = db.count_queued().await?;
//! # Ok(())
//! # }
//! ```

pub mod sync;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

use crate::client::error::ClientError;

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, ClientError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS offline_queue (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    temp_id TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL,
    content TEXT NOT NULL,
    enqueued_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_offline_queue_conversation ON offline_queue(conversation_id);
";

/// Local database connection manager
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode so the UI can read while a flush is writing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("{}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::debug!("[DB] Opened local database at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, gone when the value is dropped
    pub async fn open_in_memory() -> Result<Self> {
        // A single connection, otherwise every pooled connection gets its own
        // empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Platform data directory location of the database
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("orangecat");
        path.push("messaging.db");
        path
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

/// Connections for a file-backed database. Per-feed poll units each hold one
/// connection at a time, SQLite serializes the writes.
const MAX_CONNECTIONS: u32 = 5;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed feed store. Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// `":memory:"` opens a private in-memory database held by a single
    /// pooled connection, since every SQLite connection to `:memory:` sees its
    /// own empty database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Migration` if the schema cannot be created and
    /// `DatabaseError::Other` for connection failures.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let in_memory = path == ":memory:";

        // busy_timeout=5000: concurrent poll units wait for the write lock
        // instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)?
            .foreign_keys(true)
            .pragma("busy_timeout", "5000");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { MAX_CONNECTIONS })
            .acquire_timeout(Duration::from_secs(10));
        if in_memory {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                last_fetched_at INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BLOB PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                published_at INTEGER NOT NULL,
                feed_id BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Rotation order for next_feeds_to_fetch()
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched ON feeds(last_fetched_at, created_at)",
        )
        .execute(&mut *tx)
        .await?;

        // Point lookup for dedup; UNIQUE backs up the read-before-write check
        // when two poll units race on the same link.
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_url ON posts(url)")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_feed_published ON posts(feed_id, published_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

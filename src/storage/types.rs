use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the feed store.
///
/// Every persistence call made by the poller is scoped to one operation, so
/// these are logged where they occur and never escape a poll cycle.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The referenced row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// A post with this link is already recorded (UNIQUE index on posts.url)
    #[error("Post with link {0} already exists")]
    DuplicateLink(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map an insert failure on `posts`, turning unique violations on the
    /// link into [`DatabaseError::DuplicateLink`].
    pub(crate) fn from_post_insert(err: sqlx::Error, url: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::DuplicateLink(url.to_string());
            }
        }
        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Owner of one or more feeds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A subscribed feed and its rotation state.
///
/// `last_fetched_at` is `None` until the first poll stamps it. Feeds with no
/// stamp are always selected ahead of stamped ones.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

/// A persisted post. `url` is the natural key used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub feed_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert payload for [`Post`]. The caller generates id and timestamps.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub feed_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

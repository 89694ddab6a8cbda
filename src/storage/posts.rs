use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post};

const POST_COLUMNS: &str =
    "id, title, url, description, published_at, feed_id, created_at, updated_at";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Point lookup by link. `None` means the link has never been recorded.
    pub async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>, DatabaseError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE url = ? LIMIT 1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    /// Insert a post.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::DuplicateLink`] if another post already uses
    /// the same link.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts ({POST_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {POST_COLUMNS}"
        ))
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_post_insert(e, &post.url))
    }

    /// Posts recorded for a feed, newest publication first.
    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE feed_id = ?
             ORDER BY published_at DESC, created_at DESC"
        ))
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}

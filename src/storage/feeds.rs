use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed owned by `user_id`.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(feed_id = %feed.id, url = %feed.url, "Feed created");
        Ok(feed)
    }

    /// All feeds, oldest registration first.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at, rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Up to `limit` feeds in rotation order: never-fetched feeds first, then
    /// the least recently fetched. Ties fall back to registration order.
    pub async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Stamp `last_fetched_at` (and `updated_at`) with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] if the feed does not exist.
    pub async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query_as::<_, Feed>(&format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ?
             WHERE id = ?
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(now)
        .bind(now)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound {
            entity: "feed",
            id: feed_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn seed_feeds(db: &Database, count: usize) -> Vec<Uuid> {
        let user = db.create_user("tester").await.unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let feed = db
                .create_feed(
                    &format!("Feed {i}"),
                    &format!("https://feed{i}.example.com/rss"),
                    user.id,
                )
                .await
                .unwrap();
            ids.push(feed.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_feed_starts_unfetched() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 1).await;

        let feed = db.get_feed(ids[0]).await.unwrap().unwrap();
        assert_eq!(feed.name, "Feed 0");
        assert_eq!(feed.url, "https://feed0.example.com/rss");
        assert!(feed.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_create_feed_duplicate_url_fails() {
        let db = test_db().await;
        let user = db.create_user("tester").await.unwrap();
        db.create_feed("A", "https://example.com/rss", user.id)
            .await
            .unwrap();

        let result = db.create_feed("B", "https://example.com/rss", user.id).await;
        assert!(result.is_err());
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_feed_requires_existing_user() {
        let db = test_db().await;
        let result = db
            .create_feed("Orphan", "https://example.com/rss", Uuid::new_v4())
            .await;
        assert!(result.is_err(), "Foreign key on user_id should be enforced");
    }

    #[tokio::test]
    async fn test_next_feeds_empty_table() {
        let db = test_db().await;
        assert!(db.next_feeds_to_fetch(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_next_feeds_respects_limit() {
        let db = test_db().await;
        seed_feeds(&db, 4).await;

        assert_eq!(db.next_feeds_to_fetch(3).await.unwrap().len(), 3);
        assert_eq!(db.next_feeds_to_fetch(10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_next_feeds_never_fetched_first() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 3).await;

        // Feeds 0 and 1 have been polled, feed 2 never has
        db.mark_feed_fetched(ids[0]).await.unwrap();
        db.mark_feed_fetched(ids[1]).await.unwrap();

        let next = db.next_feeds_to_fetch(1).await.unwrap();
        assert_eq!(next[0].id, ids[2]);
    }

    #[tokio::test]
    async fn test_next_feeds_oldest_stamp_first() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 2).await;

        sqlx::query("UPDATE feeds SET last_fetched_at = ? WHERE id = ?")
            .bind(2_000_i64)
            .bind(ids[0])
            .execute(&db.pool)
            .await
            .unwrap();
        sqlx::query("UPDATE feeds SET last_fetched_at = ? WHERE id = ?")
            .bind(1_000_i64)
            .bind(ids[1])
            .execute(&db.pool)
            .await
            .unwrap();

        let next = db.next_feeds_to_fetch(2).await.unwrap();
        let order: Vec<Uuid> = next.iter().map(|f| f.id).collect();
        assert_eq!(order, vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_mark_feed_fetched_sets_timestamp() {
        let db = test_db().await;
        let ids = seed_feeds(&db, 1).await;
        let before = chrono::Utc::now().timestamp();

        let feed = db.mark_feed_fetched(ids[0]).await.unwrap();
        let stamped = feed.last_fetched_at.expect("last_fetched_at should be set");
        assert!(stamped >= before);
        assert_eq!(feed.updated_at, stamped);
    }

    #[tokio::test]
    async fn test_mark_feed_fetched_unknown_feed() {
        let db = test_db().await;
        let missing = Uuid::new_v4();

        match db.mark_feed_fetched(missing).await {
            Err(DatabaseError::NotFound { entity, id }) => {
                assert_eq!(entity, "feed");
                assert_eq!(id, missing);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }
}

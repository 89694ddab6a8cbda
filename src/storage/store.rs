use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, NewPost, Post};

/// Persistence operations the poller depends on.
///
/// Implementations must tolerate concurrent calls: every feed polled in a
/// tick issues its own calls without any coordination between them.
#[allow(async_fn_in_trait)]
pub trait FeedStore: Send + Sync {
    /// Up to `limit` feeds, never-fetched first, then least recently fetched.
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError>;

    /// Stamp the feed's last fetch time with "now" and return the updated feed.
    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError>;

    /// Look up a recorded post by its link.
    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>, DatabaseError>;

    async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError>;
}

impl FeedStore for Database {
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        Database::next_feeds_to_fetch(self, limit).await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
        Database::mark_feed_fetched(self, feed_id).await
    }

    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>, DatabaseError> {
        Database::find_post_by_url(self, url).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        Database::create_post(self, post).await
    }
}

impl<S: FeedStore> FeedStore for std::sync::Arc<S> {
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, DatabaseError> {
        (**self).next_feeds_to_fetch(limit).await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
        (**self).mark_feed_fetched(feed_id).await
    }

    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>, DatabaseError> {
        (**self).find_post_by_url(url).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        (**self).create_post(post).await
    }
}

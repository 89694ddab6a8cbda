use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use super::dedup::{EntryDeduplicator, Verdict};
use crate::feed::{parse_pub_date, DateFormatError, Entry, FeedFetcher, FetchError};
use crate::storage::{DatabaseError, Feed, FeedStore, NewPost};

/// Failures that end one feed's poll early.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Failed to mark feed as fetched: {0}")]
    MarkFetched(#[source] DatabaseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failures scoped to a single entry. The feed's poll continues past them.
#[derive(Debug, Error)]
enum EntryError {
    #[error("Entry has no link")]
    MissingLink,
    #[error("Failed to check for existing post: {0}")]
    Lookup(#[source] DatabaseError),
    #[error(transparent)]
    DateFormat(#[from] DateFormatError),
    #[error("Failed to create post: {0}")]
    Insert(#[source] DatabaseError),
}

enum EntryOutcome {
    Inserted,
    Existing,
}

/// What one feed's poll did.
#[derive(Debug)]
pub struct FeedReport {
    pub feed_id: Uuid,
    /// Entries present in the fetched document
    pub entries: usize,
    /// New posts recorded
    pub inserted: usize,
    /// Entries whose link was already recorded
    pub existing: usize,
    /// Entries dropped for a missing link, bad date or store failure
    pub skipped: usize,
    pub outcome: Result<(), PollError>,
}

impl FeedReport {
    fn new(feed_id: Uuid) -> Self {
        Self {
            feed_id,
            entries: 0,
            inserted: 0,
            existing: 0,
            skipped: 0,
            outcome: Ok(()),
        }
    }
}

/// Poll one feed: stamp it, fetch it, record every entry not seen before.
///
/// The fetch stamp is written before the network request so a feed that
/// keeps failing still moves to the back of the rotation. It is not rolled
/// back on failure.
///
/// Nothing here returns an error to the caller. Feed-level failures end the
/// poll and land in [`FeedReport::outcome`]; entry-level failures skip that
/// entry only.
#[tracing::instrument(skip_all, fields(feed_id = %feed.id, feed = %feed.name))]
pub async fn poll_feed<S: FeedStore>(store: &S, fetcher: &FeedFetcher, feed: &Feed) -> FeedReport {
    let mut report = FeedReport::new(feed.id);

    if let Err(e) = store.mark_feed_fetched(feed.id).await {
        tracing::error!(error = %e, "Error marking feed as fetched");
        report.outcome = Err(PollError::MarkFetched(e));
        return report;
    }

    let document = match fetcher.fetch(&feed.url).await {
        Ok(document) => document,
        Err(e) => {
            tracing::error!(url = %feed.url, error = %e, "Error fetching feed data");
            report.outcome = Err(PollError::Fetch(e));
            return report;
        }
    };

    report.entries = document.entries.len();
    let dedup = EntryDeduplicator::new(store);

    for entry in &document.entries {
        match record_entry(store, &dedup, feed.id, entry).await {
            Ok(EntryOutcome::Inserted) => report.inserted += 1,
            Ok(EntryOutcome::Existing) => report.existing += 1,
            Err(e) => {
                match &e {
                    EntryError::DateFormat(date_err) => tracing::warn!(
                        url = %entry.link,
                        pub_date = %date_err.value(),
                        error = %e,
                        "Could not parse published date"
                    ),
                    _ => tracing::warn!(url = %entry.link, error = %e, "Skipping entry"),
                }
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        num_posts = report.entries,
        inserted = report.inserted,
        skipped = report.skipped,
        "Feed scraping complete"
    );
    report
}

async fn record_entry<S: FeedStore>(
    store: &S,
    dedup: &EntryDeduplicator<'_, S>,
    feed_id: Uuid,
    entry: &Entry,
) -> Result<EntryOutcome, EntryError> {
    if entry.link.is_empty() {
        return Err(EntryError::MissingLink);
    }

    match dedup.check(&entry.link).await.map_err(EntryError::Lookup)? {
        Verdict::Recorded { post_id } => {
            tracing::debug!(post_id = %post_id, url = %entry.link, "Post already present, skipping");
            return Ok(EntryOutcome::Existing);
        }
        Verdict::New => {}
    }

    let published_at = parse_pub_date(entry.pub_date.as_deref().unwrap_or_default())?;

    let now = Utc::now().timestamp();
    let post = NewPost {
        id: Uuid::new_v4(),
        title: entry.title.clone(),
        url: entry.link.clone(),
        description: entry.description.clone(),
        published_at: published_at.timestamp(),
        feed_id,
        created_at: now,
        updated_at: now,
    };

    match store.create_post(&post).await {
        Ok(created) => {
            tracing::debug!(post_id = %created.id, url = %created.url, "Post created");
            Ok(EntryOutcome::Inserted)
        }
        // Another poll recorded the link between our check and insert
        Err(DatabaseError::DuplicateLink(url)) => {
            tracing::debug!(url = %url, "Post recorded concurrently, skipping");
            Ok(EntryOutcome::Existing)
        }
        Err(e) => Err(EntryError::Insert(e)),
    }
}

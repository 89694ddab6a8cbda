use uuid::Uuid;

use crate::storage::{DatabaseError, FeedStore};

/// Whether an entry's link has been recorded before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    New,
    Recorded { post_id: Uuid },
}

/// Decides per link whether an entry is new, by a point lookup in the store.
///
/// Nothing is cached between calls; every check is a store round trip.
pub struct EntryDeduplicator<'a, S> {
    store: &'a S,
}

impl<'a, S: FeedStore> EntryDeduplicator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn check(&self, link: &str) -> Result<Verdict, DatabaseError> {
        Ok(match self.store.find_post_by_url(link).await? {
            Some(post) => Verdict::Recorded { post_id: post.id },
            None => Verdict::New,
        })
    }
}

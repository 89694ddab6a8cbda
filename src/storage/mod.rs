//! SQLite persistence for users, feeds and posts.
//!
//! [`Database`] is the concrete store; the poller only sees it through the
//! [`FeedStore`] trait.

mod feeds;
mod posts;
mod schema;
mod store;
mod types;
mod users;

pub use schema::Database;
pub use store::FeedStore;
pub use types::{DatabaseError, Feed, NewPost, Post, User};

//! Curator polls RSS feeds on a fixed interval and records every newly
//! published entry as a post, skipping links it has already seen.
//!
//! - [`poller`] - tick loop, per-feed polling and deduplication
//! - [`feed`] - HTTP fetch and RSS decoding
//! - [`storage`] - SQLite feed store
//! - [`config`] - TOML configuration

pub mod config;
pub mod feed;
pub mod poller;
pub mod storage;

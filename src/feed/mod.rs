//! Retrieval and decoding of RSS 2.0 feed documents.
//!
//! - [`parser`] - RSS channel/item decoding and `pubDate` parsing
//! - [`fetcher`] - HTTP retrieval with a timeout and body size limit
//!
//! # Example
//!
//! ```ignore
//! use curator::feed::FeedFetcher;
//!
//! let doc = FeedFetcher::default().fetch("https://blog.example.com/rss").await?;
//! for entry in &doc.entries {
//!     println!("{} {}", entry.title, entry.link);
//! }
//! ```

pub mod fetcher;
pub mod parser;

pub use fetcher::{FeedFetcher, FetchError};
pub use parser::{
    parse_document, parse_pub_date, DateFormatError, Entry, FetchedDocument, FormatError,
};

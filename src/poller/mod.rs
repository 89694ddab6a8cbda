//! The periodic polling engine.
//!
//! ```text
//! tick -> FeedStore::next_feeds_to_fetch(concurrency)
//!      -> per feed, concurrently: stamp -> fetch -> dedup -> insert
//!      -> join all -> next tick
//! ```
//!
//! - [`scheduler`] - tick loop, fan-out and shutdown
//! - [`refresh`] - one feed's poll
//! - [`dedup`] - "already recorded?" decision per link
//! - [`ticker`] - timer abstraction so the loop can run without a real clock

pub mod dedup;
pub mod refresh;
pub mod scheduler;
pub mod ticker;

pub use dedup::{EntryDeduplicator, Verdict};
pub use refresh::{poll_feed, FeedReport, PollError};
pub use scheduler::{start_polling, Poller, TickReport};
pub use ticker::{interval_ticker, Ticker};
// Test drivers for the tick loop
#[doc(hidden)]
pub use ticker::{ManualTicker, TickHandle};

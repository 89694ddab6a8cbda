use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::watch;

use super::refresh::{poll_feed, FeedReport};
use super::ticker::{interval_ticker, Ticker};
use crate::feed::FeedFetcher;
use crate::storage::FeedStore;

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub feeds: Vec<FeedReport>,
}

impl TickReport {
    pub fn polled(&self) -> usize {
        self.feeds.len()
    }

    pub fn failed(&self) -> usize {
        self.feeds.iter().filter(|r| r.outcome.is_err()).count()
    }

    pub fn inserted(&self) -> usize {
        self.feeds.iter().map(|r| r.inserted).sum()
    }
}

/// Periodic feed poller.
///
/// Each tick selects up to `concurrency` due feeds, polls them all
/// concurrently and waits for every one to finish before the next tick is
/// considered. Ticks therefore never overlap, and the same feed is never
/// polled by two units at once.
pub struct Poller<S> {
    store: S,
    fetcher: FeedFetcher,
    concurrency: usize,
}

impl<S: FeedStore> Poller<S> {
    /// `concurrency` below 1 is raised to 1.
    pub fn new(store: S, fetcher: FeedFetcher, concurrency: usize) -> Self {
        Self {
            store,
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a single tick: select due feeds, poll them, join.
    ///
    /// A failed selection makes the tick a no-op. Per-feed failures are
    /// reported in the returned [`TickReport`], never propagated.
    pub async fn poll_once(&self) -> TickReport {
        let feeds = match self.store.next_feeds_to_fetch(self.concurrency).await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Error fetching feeds");
                return TickReport::default();
            }
        };

        if feeds.is_empty() {
            tracing::debug!("No feeds due");
            return TickReport::default();
        }

        tracing::debug!(feeds = feeds.len(), "Polling feeds");

        let reports: Vec<FeedReport> = stream::iter(feeds.iter())
            .map(|feed| poll_feed(&self.store, &self.fetcher, feed))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        TickReport { feeds: reports }
    }

    /// Poll on every tick of `ticker` until `shutdown` turns true or its
    /// sender is dropped.
    ///
    /// Shutdown is only observed between ticks: a batch that has started
    /// always runs to completion.
    pub async fn run<T: Ticker>(&self, mut ticker: T, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(concurrency = self.concurrency, "Starting scrape operation");

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let ticked = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    false
                }
                _ = ticker.tick() => true,
            };
            if !ticked {
                continue;
            }

            let report = self.poll_once().await;
            if report.polled() > 0 {
                tracing::info!(
                    polled = report.polled(),
                    failed = report.failed(),
                    inserted = report.inserted(),
                    "Tick complete"
                );
            }
        }

        tracing::info!("Scrape operation stopped");
    }
}

/// Poll `store` every `interval` with up to `concurrency` feeds per tick
/// until `shutdown` turns true or its sender is dropped.
///
/// This is the engine's entry point: it builds the [`Poller`] and drives it
/// with [`interval_ticker`], so the first tick fires immediately.
pub async fn start_polling<S: FeedStore>(
    store: S,
    fetcher: FeedFetcher,
    concurrency: usize,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        concurrency = concurrency,
        interval = ?interval,
        "Starting feed polling"
    );
    Poller::new(store, fetcher, concurrency)
        .run(interval_ticker(interval), shutdown)
        .await;
}

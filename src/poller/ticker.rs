use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Source of poll ticks.
///
/// The scheduler only ever awaits the next tick, so a timer and a manually
/// driven channel are interchangeable.
#[allow(async_fn_in_trait)]
pub trait Ticker {
    /// Wait for the next tick.
    async fn tick(&mut self);
}

impl Ticker for Interval {
    async fn tick(&mut self) {
        Interval::tick(self).await;
    }
}

/// Fixed-period timer whose first tick fires immediately.
///
/// Ticks missed while a batch overran the period are not replayed: the next
/// tick is pushed back to one full period after the late one.
pub fn interval_ticker(period: Duration) -> Interval {
    // tokio::time::interval panics on a zero period
    let period = period.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Ticker driven by hand through a [`TickHandle`], for driving
/// [`Poller::run`](super::Poller::run) in tests without a clock.
///
/// Once every handle is dropped the ticker never fires again.
#[doc(hidden)]
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::Receiver<()>,
}

/// Sending half of a [`ManualTicker`].
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::Sender<()>,
}

impl ManualTicker {
    pub fn new() -> (TickHandle, ManualTicker) {
        let (tx, rx) = mpsc::channel(16);
        (TickHandle { tx }, ManualTicker { rx })
    }
}

impl TickHandle {
    /// Queue one tick. Returns false if the ticker has been dropped.
    pub async fn tick(&self) -> bool {
        self.tx.send(()).await.is_ok()
    }
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

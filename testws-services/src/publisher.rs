//! Periodic quote publisher
//!
//! Emits a synthetic price tick on a fixed interval and fans it out to
//! connected clients through the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

use testws_core::QuoteTick;

use crate::registry::ConnectionRegistry;

/// Configuration for the tick publisher
#[derive(Debug, Clone)]
pub struct TickPublisherConfig {
    /// Symbol stamped on every tick
    pub symbol: String,
    /// Time between ticks; must be non-zero
    pub period: Duration,
}

impl Default for TickPublisherConfig {
    fn default() -> Self {
        Self {
            symbol: "MSFT".to_string(),
            period: Duration::from_millis(1000),
        }
    }
}

/// Periodic publisher of synthetic quote ticks
///
/// The price is a plain counter: each tick publishes the current value and
/// advances it, whether or not anyone is connected.
pub struct TickPublisher {
    registry: Arc<ConnectionRegistry>,
    config: TickPublisherConfig,
    /// Next price to publish
    sequence: AtomicU64,
}

impl TickPublisher {
    /// Create a new publisher over the given registry
    pub fn new(registry: Arc<ConnectionRegistry>, config: TickPublisherConfig) -> Self {
        Self {
            registry,
            config,
            sequence: AtomicU64::new(0),
        }
    }

    /// Build the next tick, advancing the price sequence
    fn next_tick(&self) -> QuoteTick {
        let price = self.sequence.fetch_add(1, Ordering::SeqCst);
        QuoteTick::new(self.config.symbol.clone(), price)
    }

    /// Publish a single tick to every open connection
    ///
    /// Returns the number of delivery attempts.
    pub fn publish_once(&self) -> usize {
        let tick = self.next_tick();
        let attempts = self.registry.broadcast(&tick);
        debug!("Published {:?} to {} connection(s)", tick, attempts);
        attempts
    }

    /// Start the publishing loop
    ///
    /// The first tick fires one full period after start, then one per
    /// period. Ticks are processed on the loop itself, so two firings can
    /// never overlap. The loop runs until the returned handle stops it or
    /// is dropped.
    pub fn start(self: Arc<Self>) -> PublisherHandle {
        info!(
            "Starting tick publisher for {} every {:?}",
            self.config.symbol, self.config.period
        );

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let period = self.config.period;
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.publish_once();
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Tick publisher stopping");
                        break;
                    }
                }
            }
        });

        PublisherHandle { shutdown_tx, task }
    }
}

/// Handle for stopping a running tick publisher
///
/// The server never stops its publisher; the handle exists so the loop can
/// be shut down deterministically, and dropping it stops the loop as well.
pub struct PublisherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    /// Stop the publishing loop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

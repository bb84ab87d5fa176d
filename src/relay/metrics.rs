use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics of relaying on a chain.
#[derive(Metrics)]
#[metrics(scope = "relay")]
pub struct RelayMetrics {
    /// Number of submitted batch transactions.
    pub sent: Counter,
    /// Number of confirmed batches.
    pub confirmed: Counter,
    /// Number of failed jobs.
    pub failed: Counter,
    /// Number of jobs rebuilt after their nonce went stale.
    pub stale_retries: Counter,
    /// Number of jobs retried after a transient error.
    pub transient_retries: Counter,
    /// Number of transfers waiting in the trigger queue.
    pub queued: Gauge,
    /// Whether the trigger queue is paused.
    pub paused: Gauge,
    /// Time it takes to confirm a batch, in milliseconds.
    pub confirmation_time: Histogram,
}

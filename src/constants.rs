//! Relay constants.

use std::time::Duration;

/// Default poll interval for http providers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Default time to wait for a transaction to be included.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of times a signed transaction is re-sent after a confirmation timeout.
pub const DEFAULT_REBROADCAST_ATTEMPTS: u32 = 3;

/// Default capacity of a per-chain trigger queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default number of retries of a job failing with a transient error.
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 5;

/// Default initial backoff between retries of a job failing with a transient error.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Extra gas added on top of estimates, in percent.
pub const GAS_BUFFER_PERCENT: u64 = 20;

//! Relaying of signed batches on behalf of the controlled account.

mod builder;
pub use builder::{JobBuilder, forward_calls};

mod dispatcher;
pub use dispatcher::Dispatcher;

mod metrics;
pub use metrics::RelayMetrics;

mod signer;
pub use signer::{BatchSigner, recover_batch_signer, verify_batch};

mod balance;
pub use balance::BalanceCollector;

mod job;
use job::PeriodicJob;

use crate::{chains::Chains, error::ChainError};
use alloy::primitives::Address;
use std::{fmt::Debug, future::Future, time::Duration};

/// Trait for a collector that records its own metric.
pub trait MetricCollector: Debug {
    /// Collects metrics and records them.
    fn collect(&self) -> impl Future<Output = Result<(), ChainError>> + Send;
}

/// Spawns all available periodic metric collectors.
pub fn spawn_periodic_collectors(chains: Chains, accounts: Vec<Address>) {
    PeriodicJob::launch_task(
        BalanceCollector::new(chains, accounts),
        tokio::time::interval(Duration::from_secs(30)),
    );
}

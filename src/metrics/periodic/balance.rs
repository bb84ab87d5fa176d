use super::MetricCollector;
use crate::{chain::ChainApi, chains::Chains, error::ChainError};
use alloy::primitives::Address;
use metrics::gauge;

/// Records the native balance of the relay's accounts on every chain.
#[derive(Debug)]
pub struct BalanceCollector {
    chains: Chains,
    accounts: Vec<Address>,
}

impl BalanceCollector {
    /// Creates a new instance of [`BalanceCollector`].
    pub fn new(chains: Chains, accounts: Vec<Address>) -> Self {
        Self { chains, accounts }
    }
}

impl MetricCollector for BalanceCollector {
    async fn collect(&self) -> Result<(), ChainError> {
        for context in self.chains.iter() {
            let chain_id = context.chain_id();
            for address in &self.accounts {
                let balance = context.client.get_balance(*address).await?;

                gauge!(
                    "balance",
                    "address" => address.to_checksum(Some(chain_id)),
                    "chain_id" => chain_id.to_string()
                )
                .set::<f64>(balance.into());
            }
        }
        Ok(())
    }
}

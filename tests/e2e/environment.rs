//! Relay end-to-end test environment

use super::*;
use alloy::primitives::{Address, U256};
use alloy_chains::Chain;
use eyre::Result;
use relay::{
    chain::{ChainClient, InMemoryChain, SentRecord},
    chains::{Accounts, ChainContext, Chains},
    config::{ChainConfig, RelaySettings, TimeoutPolicy},
    relay::Dispatcher,
    service::RelayService,
    signers::DynSigner,
};
use std::{sync::Arc, time::Duration};

/// A relay service on a single in-memory chain.
pub struct Environment {
    pub chain: Arc<InMemoryChain>,
    pub chain_key: Chain,
    pub service: RelayService,
    pub controlled: Address,
    pub relayer: Address,
}

impl Environment {
    /// Sets up an environment with short timeouts and the marker call enabled.
    pub fn setup() -> Result<Self> {
        Self::setup_with(TimeoutPolicy::Rebroadcast { attempts: 3 }, true)
    }

    /// Sets up an environment with the given timeout policy and marker call setting.
    pub fn setup_with(timeout_policy: TimeoutPolicy, marker_call: bool) -> Result<Self> {
        let chain = Arc::new(InMemoryChain::new(CHAIN_ID, IMPLEMENTATION));
        chain.add_asset(ASSET);

        let settings = RelaySettings {
            confirmation_timeout: Duration::from_millis(50),
            timeout_policy,
            queue_capacity: 16,
            max_transient_retries: 3,
            retry_backoff: Duration::from_millis(10),
        };
        let config = ChainConfig {
            endpoint: "http://localhost:8545".parse()?,
            delegation_target: IMPLEMENTATION,
            asset: ASSET,
            recipient: RECIPIENT,
            marker_call,
            delegation_calls: vec![],
        };
        let chain_key = Chain::from_id(CHAIN_ID);
        let context =
            ChainContext::new(chain_key, ChainClient::new(chain.clone()), &config, settings);

        let accounts = Accounts::new(
            DynSigner::from_signing_key(CONTROLLED_KEY)?,
            DynSigner::from_signing_key(RELAYER_KEY)?,
        )?;
        let controlled = accounts.controlled().address();
        let relayer = accounts.relayer().address();

        Ok(Self {
            chain,
            chain_key,
            service: RelayService::new(Chains::new([context]), accounts),
            controlled,
            relayer,
        })
    }

    /// Delegates the controlled account to the configured implementation.
    pub async fn delegate(&self) -> Result<()> {
        self.service.ensure_delegation(self.chain_key, None).await?;
        Ok(())
    }

    /// Credits the controlled account with `amount` of the asset.
    pub fn deposit(&self, amount: u64) {
        self.chain.emit_transfer(ASSET, SOURCE, self.controlled, U256::from(amount));
    }

    /// A dispatcher for the chain.
    pub fn dispatcher(&self) -> Result<Dispatcher> {
        Ok(Dispatcher::new(
            self.service.chains().get(self.chain_key)?,
            self.service.accounts().clone(),
        ))
    }

    /// Transactions sent by the relayer.
    pub fn relayed(&self) -> Vec<SentRecord> {
        self.chain
            .sent_transactions()
            .into_iter()
            .filter(|record| record.from == self.relayer)
            .collect()
    }

    /// Transactions sent by the controlled account.
    pub fn delegation_transactions(&self) -> Vec<SentRecord> {
        self.chain
            .sent_transactions()
            .into_iter()
            .filter(|record| record.from == self.controlled)
            .collect()
    }
}

//! The operations exposed by the relay.

use crate::{
    chain::ChainApi,
    chains::{Accounts, Chains},
    config::RelayConfig,
    delegation::{DelegationManager, DelegationOutcome},
    error::RelayError,
    queue::RelayQueue,
    relay::Dispatcher,
    types::{DelegationStatus, Receipt},
};
use alloy::primitives::{Address, U256};
use alloy_chains::Chain;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

/// Native balances of the relay's accounts on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalances {
    /// The chain.
    pub chain: Chain,
    /// Balance of the controlled account.
    pub controlled: U256,
    /// Balance of the relayer.
    pub relayer: U256,
}

/// The relay service.
#[derive(Debug, Clone)]
pub struct RelayService {
    chains: Chains,
    accounts: Accounts,
}

impl RelayService {
    /// Creates a new instance of [`RelayService`].
    pub fn new(chains: Chains, accounts: Accounts) -> Self {
        Self { chains, accounts }
    }

    /// Validates the configuration, loads the signers and connects to every chain.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let accounts = Accounts::load(&config.secrets).await?;
        let chains = Chains::connect(config).await?;

        info!(
            controlled = %accounts.controlled().address(),
            relayer = %accounts.relayer().address(),
            chains = chains.len(),
            "Relay service ready"
        );
        Ok(Self::new(chains, accounts))
    }

    /// The configured chains.
    pub fn chains(&self) -> &Chains {
        &self.chains
    }

    /// The relay's accounts.
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    fn delegation(&self, chain: Chain) -> Result<DelegationManager, RelayError> {
        Ok(DelegationManager::new(self.chains.get(chain)?, self.accounts.controlled().clone()))
    }

    fn dispatcher(&self, chain: Chain) -> Result<Dispatcher, RelayError> {
        Ok(Dispatcher::new(self.chains.get(chain)?, self.accounts.clone()))
    }

    /// Makes the controlled account delegate to `desired_target`, or to the configured target.
    pub async fn ensure_delegation(
        &self,
        chain: Chain,
        desired_target: Option<Address>,
    ) -> Result<DelegationOutcome, RelayError> {
        Ok(self.delegation(chain)?.ensure(desired_target).await?)
    }

    /// Reads the delegation status of the controlled account.
    pub async fn check_delegation_status(
        &self,
        chain: Chain,
    ) -> Result<DelegationStatus, RelayError> {
        Ok(self.delegation(chain)?.status().await?)
    }

    /// Forwards `amount` of the chain's asset to `recipient` in a signed batch.
    ///
    /// Fails if the controlled account is not delegated to the configured target.
    pub async fn relay(
        &self,
        chain: Chain,
        recipient: Address,
        amount: U256,
    ) -> Result<Receipt, RelayError> {
        self.dispatcher(chain)?.relay_amount(recipient, amount).await
    }

    /// Clears the delegation of the controlled account.
    pub async fn revoke_delegation(&self, chain: Chain) -> Result<Receipt, RelayError> {
        Ok(self.delegation(chain)?.revoke().await?)
    }

    /// Ensures the delegation, then relays inbound transfers until the subscription ends or a
    /// protocol violation pauses the queue.
    #[instrument(skip(self))]
    pub async fn watch(&self, chain: Chain) -> Result<(), RelayError> {
        let outcome = self.ensure_delegation(chain, None).await?;
        info!(state = ?outcome.state, transactions = outcome.receipts.len(), "Delegation ready");

        RelayQueue::new(self.dispatcher(chain)?).run().await
    }

    /// Runs [`Self::watch`] on every chain in parallel.
    ///
    /// Chains are independent: a chain that stops does not stop the others. Returns the first
    /// error once all chains stopped.
    pub async fn watch_all(&self) -> Result<(), RelayError> {
        let balances = self.balances().await?;
        for balance in &balances {
            info!(
                chain = %balance.chain,
                controlled = %balance.controlled,
                relayer = %balance.relayer,
                "Account balances"
            );
        }

        let results = futures_util::future::join_all(
            self.chains.iter().map(|context| async move {
                let result = self.watch(context.chain).await;
                if let Err(err) = &result {
                    error!(chain = %context.chain, %err, "Stopped watching chain");
                }
                result
            }),
        )
        .await;

        results.into_iter().collect()
    }

    /// Reads the native balances of both accounts on every chain.
    pub async fn balances(&self) -> Result<Vec<AccountBalances>, RelayError> {
        let controlled = self.accounts.controlled().address();
        let relayer = self.accounts.relayer().address();

        futures_util::future::try_join_all(self.chains.iter().map(|context| async move {
            Ok::<_, RelayError>(AccountBalances {
                chain: context.chain,
                controlled: context.client.get_balance(controlled).await?,
                relayer: context.client.get_balance(relayer).await?,
            })
        }))
        .await
    }
}

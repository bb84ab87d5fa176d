//! Chain access for the relay.

mod api;
pub use api::{ChainApi, ChainTransaction, Result, SentTransaction, TransferStream};

mod memory;
pub use memory::{InMemoryChain, SentRecord};

mod rpc;
pub use rpc::RpcChain;

use crate::{config::TimeoutPolicy, signers::DynSigner, types::Receipt};
use alloy::primitives::{Address, B256, Bytes, ChainId, U256};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{instrument, warn};
use url::Url;

/// Outcome of waiting for a sent transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// The transaction was included.
    Included(Receipt),
    /// The transaction was not seen included after `attempts` waits.
    Unconfirmed {
        /// Number of bounded waits.
        attempts: u32,
    },
}

/// Handle to a chain.
#[derive(Debug, Clone)]
pub struct ChainClient {
    inner: Arc<dyn ChainApi>,
}

impl ChainClient {
    /// Create a [`ChainClient`] from a [`ChainApi`] implementation.
    pub fn new(inner: Arc<dyn ChainApi>) -> Self {
        Self { inner }
    }

    /// Connects to a node at `endpoint`.
    pub async fn connect(endpoint: &Url) -> Result<Self> {
        Ok(Self::new(Arc::new(RpcChain::connect(endpoint).await?)))
    }

    /// Waits for a sent transaction to be included, applying the [`TimeoutPolicy`] when a wait
    /// times out.
    ///
    /// A timeout is not treated as a failure: the receipt is checked again before re-sending the
    /// same signed transaction.
    #[instrument(skip_all, fields(chain_id = self.chain_id(), tx_hash = %sent.tx_hash))]
    pub async fn confirm(
        &self,
        sent: &SentTransaction,
        timeout: Duration,
        policy: TimeoutPolicy,
    ) -> Result<Confirmation> {
        let mut waits = 0;
        let mut rebroadcasts = 0;

        loop {
            waits += 1;
            if let Some(receipt) = self.wait_for_receipt(sent.tx_hash, timeout).await? {
                return Ok(Confirmation::Included(receipt));
            }
            if let Some(receipt) = self.get_receipt(sent.tx_hash).await? {
                return Ok(Confirmation::Included(receipt));
            }

            match policy {
                TimeoutPolicy::Rebroadcast { attempts } if rebroadcasts < attempts => {
                    rebroadcasts += 1;
                    warn!(rebroadcasts, "Transaction not included in time, rebroadcasting");
                    self.rebroadcast(sent).await?;
                }
                _ => return Ok(Confirmation::Unconfirmed { attempts: waits }),
            }
        }
    }
}

#[async_trait]
impl ChainApi for ChainClient {
    fn chain_id(&self) -> ChainId {
        self.inner.chain_id()
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.inner.get_code(address).await
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.inner.get_balance(address).await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        self.inner.get_transaction_count(address).await
    }

    async fn contract_nonce(&self, account: Address) -> Result<U256> {
        self.inner.contract_nonce(account).await
    }

    async fn simulate(&self, tx: &ChainTransaction) -> Result<Bytes> {
        self.inner.simulate(tx).await
    }

    async fn send_transaction(
        &self,
        tx: ChainTransaction,
        signer: &DynSigner,
    ) -> Result<SentTransaction> {
        self.inner.send_transaction(tx, signer).await
    }

    async fn rebroadcast(&self, tx: &SentTransaction) -> Result<()> {
        self.inner.rebroadcast(tx).await
    }

    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        self.inner.get_receipt(tx_hash).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<Option<Receipt>> {
        self.inner.wait_for_receipt(tx_hash, timeout).await
    }

    async fn transfers(&self, asset: Address, recipient: Address) -> Result<TransferStream> {
        self.inner.transfers(asset, recipient).await
    }
}

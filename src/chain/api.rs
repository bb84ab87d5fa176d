//! Chain api.

use crate::{
    error::ChainError,
    signers::DynSigner,
    types::{Receipt, TransferEvent},
};
use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256, Bytes, ChainId, U256},
};
use async_trait::async_trait;
use futures_util::Stream;
use std::{fmt::Debug, pin::Pin, time::Duration};

/// Type alias for `Result<T, ChainError>`
pub type Result<T> = core::result::Result<T, ChainError>;

/// Stream of inbound asset transfers.
pub type TransferStream = Pin<Box<dyn Stream<Item = TransferEvent> + Send>>;

/// A transaction to be sent by one of the relay's signers.
///
/// Nonce, gas and fees are filled in on submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainTransaction {
    /// The sender.
    pub from: Address,
    /// The destination.
    pub to: Address,
    /// Attached native value.
    pub value: U256,
    /// Calldata.
    pub input: Bytes,
    /// EIP-7702 authorizations carried by the transaction.
    pub authorization_list: Vec<SignedAuthorization>,
}

impl ChainTransaction {
    /// Creates a call from `from` to `to` with the given input.
    pub fn new(from: Address, to: Address, input: impl Into<Bytes>) -> Self {
        Self { from, to, input: input.into(), ..Default::default() }
    }

    /// Attaches an authorization to the transaction.
    pub fn with_authorization(mut self, authorization: SignedAuthorization) -> Self {
        self.authorization_list.push(authorization);
        self
    }
}

/// A signed transaction that was broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    /// Hash of the transaction.
    pub tx_hash: B256,
    /// Nonce of the sender.
    pub nonce: u64,
    /// The EIP-2718 encoded transaction, re-sent as is on rebroadcast.
    pub encoded: Bytes,
}

/// Chain capabilities used by the relay.
#[async_trait]
pub trait ChainApi: Debug + Send + Sync {
    /// The id of the chain.
    fn chain_id(&self) -> ChainId;

    /// Returns the code of `address`.
    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// Returns the native balance of `address`.
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Returns the pending transaction count of `address`.
    async fn get_transaction_count(&self, address: Address) -> Result<u64>;

    /// Reads the contract nonce of a delegated account.
    async fn contract_nonce(&self, account: Address) -> Result<U256>;

    /// Executes the transaction against the latest state without committing it.
    ///
    /// Returns [`ChainError::Reverted`] if the transaction reverts.
    async fn simulate(&self, tx: &ChainTransaction) -> Result<Bytes>;

    /// Fills, signs and broadcasts the transaction.
    async fn send_transaction(
        &self,
        tx: ChainTransaction,
        signer: &DynSigner,
    ) -> Result<SentTransaction>;

    /// Re-sends a previously broadcast transaction.
    async fn rebroadcast(&self, tx: &SentTransaction) -> Result<()>;

    /// Returns the receipt of a transaction, if it was included.
    async fn get_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    /// Waits up to `timeout` for the transaction to be included.
    ///
    /// Returns `None` if it was not included in time.
    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<Option<Receipt>>;

    /// Subscribes to transfers of `asset` into `recipient`.
    ///
    /// The stream ends when the underlying subscription is lost.
    async fn transfers(&self, asset: Address, recipient: Address) -> Result<TransferStream>;
}

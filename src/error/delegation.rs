use super::ChainError;
use crate::types::DelegationStatus;
use alloy::primitives::{Address, B256, ChainId};

/// Errors related to the EIP-7702 delegation lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    /// The account is not delegated to the implementation contract.
    #[error("{account} is not delegated to {expected} on chain {chain_id}: {status}")]
    NotDelegated {
        /// The controlled account.
        account: Address,
        /// The chain.
        chain_id: ChainId,
        /// The expected delegation target.
        expected: Address,
        /// The current status.
        status: DelegationStatus,
    },
    /// A confirmed transaction carried an authorization that did not take effect.
    ///
    /// EIP-7702 skips invalid authorizations without reverting, eg. when the account nonce moved
    /// between building the authorization and its inclusion.
    #[error("authorization for {target} not applied by {tx_hash}, account is {status}")]
    AuthorizationNotApplied {
        /// The authorized target.
        target: Address,
        /// The transaction carrying the authorization.
        tx_hash: B256,
        /// The status after inclusion.
        status: DelegationStatus,
    },
    /// A delegation transaction reverted.
    #[error("delegation transaction {0} reverted")]
    TransactionReverted(B256),
    /// A delegation transaction was not included in time.
    #[error("delegation transaction {0} was not included in time")]
    Unconfirmed(B256),
    /// Error occurred while signing the authorization.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),
    /// Error talking to the chain. The delegation state is unknown.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl DelegationError {
    /// Whether the error is transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Chain(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Whether the error must pause relaying on the chain.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::NotDelegated { .. } | Self::AuthorizationNotApplied { .. })
    }
}

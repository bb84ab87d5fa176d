use super::ChainError;
use alloy::primitives::{B256, U256};

/// Errors that may occur while relaying a signed batch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The contract nonce advanced since the batch was signed.
    #[error("stale batch: signed against nonce {signed}, contract is at {current}")]
    StaleNonce {
        /// The nonce the batch was signed against.
        signed: U256,
        /// The current contract nonce.
        current: U256,
        /// The reverted transaction, if it was mined.
        tx_hash: Option<B256>,
    },
    /// The account rejected the batch signature although the nonce is current.
    ///
    /// Indicates a digest construction bug or a different implementation contract.
    #[error("batch signature rejected at nonce {nonce}")]
    SignatureRejected {
        /// The nonce the batch was signed against.
        nonce: U256,
        /// The reverted transaction, if it was mined.
        tx_hash: Option<B256>,
    },
    /// The batch reverted for another reason, eg. insufficient asset balance.
    #[error("batch reverted: {reason}")]
    Reverted {
        /// The decoded revert reason.
        reason: String,
        /// The reverted transaction, if it was mined.
        tx_hash: Option<B256>,
    },
    /// The transaction may still land but was not confirmed in time.
    #[error("transaction {tx_hash} unconfirmed after {attempts} attempts")]
    Unconfirmed {
        /// The last sent transaction.
        tx_hash: B256,
        /// Number of waits.
        attempts: u32,
    },
    /// The batch may have been broadcast, but its outcome could not be read.
    ///
    /// Never retried, since the batch may already be executed.
    #[error("outcome of batch transaction {tx_hash:?} unknown: {source}")]
    Unresolved {
        /// The sent transaction, if the send returned.
        tx_hash: Option<B256>,
        /// The error that interrupted the submission.
        source: ChainError,
    },
    /// The job was dispatched before being signed.
    #[error("job is not signed")]
    Unsigned,
    /// Error talking to the chain.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl DispatchError {
    /// Whether a rebuild against a fresh nonce may succeed.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleNonce { .. })
    }

    /// Whether the error is transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Chain(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Whether the error must pause relaying on the chain.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::SignatureRejected { .. })
    }

    /// The transaction hash involved, if any.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::StaleNonce { tx_hash, .. }
            | Self::SignatureRejected { tx_hash, .. }
            | Self::Reverted { tx_hash, .. }
            | Self::Unresolved { tx_hash, .. } => *tx_hash,
            Self::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            Self::Unsigned | Self::Chain(_) => None,
        }
    }

    /// The revert reason, if any.
    pub fn revert_reason(&self) -> Option<String> {
        match self {
            Self::Reverted { reason, .. } => Some(reason.clone()),
            Self::SignatureRejected { .. } => {
                Some(crate::types::INVALID_SIGNATURE_REASON.to_string())
            }
            Self::Chain(err) => err.revert_reason(),
            _ => None,
        }
    }
}

use alloy::{
    primitives::{B256, Bytes},
    providers::PendingTransactionError,
    sol_types::{Revert, SolError, decode_revert_reason},
    transports::{RpcError, TransportErrorKind},
};

/// Errors returned by a [`ChainApi`](crate::chain::ChainApi).
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The call or transaction reverted.
    #[error("execution reverted: {}", revert_reason(.data))]
    Reverted {
        /// The raw revert data.
        data: Bytes,
    },
    /// The transaction was not included within the allotted time.
    #[error("transaction {0} was not included in time")]
    Timeout(B256),
    /// Error occurred while signing a transaction.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),
    /// RPC error.
    #[error(transparent)]
    Rpc(RpcError<TransportErrorKind>),
    /// Other errors.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ChainError {
    /// Whether the error is transient, ie. a network failure or a timeout.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rpc(err) => !err.is_error_resp(),
            Self::Timeout(_) => true,
            Self::Reverted { .. } | Self::Sign(_) | Self::Other(_) => false,
        }
    }

    /// Returns the revert data, if the error is a revert.
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::Reverted { data } => Some(data),
            _ => None,
        }
    }

    /// Returns the decoded revert reason, if the error is a revert.
    pub fn revert_reason(&self) -> Option<String> {
        self.revert_data().map(|data| revert_reason(data))
    }
}

impl From<RpcError<TransportErrorKind>> for ChainError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err.as_error_resp().and_then(|payload| payload.as_revert_data()) {
            Some(data) => Self::Reverted { data },
            None => Self::Rpc(err),
        }
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(err) => err.into(),
            err => Self::Other(Box::new(err)),
        }
    }
}

impl From<PendingTransactionError> for ChainError {
    fn from(value: PendingTransactionError) -> Self {
        match value {
            PendingTransactionError::TransportError(err) => err.into(),
            err => Self::Other(Box::new(err)),
        }
    }
}

/// Decodes revert data into a readable reason.
///
/// `Error(string)` reverts yield the bare reason string, other known reverts their display
/// form, and anything else the hex encoded data.
pub fn revert_reason(data: &[u8]) -> String {
    Revert::abi_decode(data)
        .map(|revert| revert.reason)
        .ok()
        .or_else(|| decode_revert_reason(data))
        .unwrap_or_else(|| alloy::primitives::hex::encode_prefixed(data))
}

//! Relay error types.
use thiserror::Error;

mod chain;
pub use chain::{ChainError, revert_reason};

mod config;
pub use config::ConfigError;

mod delegation;
pub use delegation::DelegationError;

mod dispatch;
pub use dispatch::DispatchError;

/// The overarching error type returned by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Errors related to configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Errors related to the delegation lifecycle.
    #[error(transparent)]
    Delegation(#[from] DelegationError),
    /// Errors related to relaying batches.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// An error occurred talking to a chain.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl RelayError {
    /// Whether the error is transient, ie. the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Delegation(err) => err.is_transient(),
            Self::Dispatch(err) => err.is_transient(),
            Self::Chain(err) => err.is_transient(),
            Self::Config(_) | Self::Internal(_) => false,
        }
    }

    /// Whether the error indicates a misconfigured account or a protocol bug.
    ///
    /// Relay queues pause on these instead of submitting further jobs.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            Self::Delegation(err) => err.is_protocol_violation(),
            Self::Dispatch(err) => err.is_protocol_violation(),
            _ => false,
        }
    }
}

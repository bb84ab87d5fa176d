//! EIP-7702 delegation status of an account.

use alloy::{
    eips::eip7702::constants::{EIP7702_CLEARED_DELEGATION, EIP7702_DELEGATION_DESIGNATOR},
    primitives::{Address, Bytes},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a delegation designator: `0xef0100 || address`.
pub const DELEGATION_CODE_LENGTH: usize = 23;

/// Delegation status of an account, derived from its on-chain code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum DelegationStatus {
    /// The account has no code.
    NotDelegated,
    /// The account delegates to the given address.
    DelegatedTo(Address),
    /// The account has code that is not a delegation designator.
    DelegatedUnknownFormat(Bytes),
}

impl DelegationStatus {
    /// Derives the status from the code of an account.
    pub fn from_code(code: &[u8]) -> Self {
        if code.is_empty() || code == EIP7702_CLEARED_DELEGATION {
            return Self::NotDelegated;
        }

        if code.len() == DELEGATION_CODE_LENGTH && code.starts_with(&EIP7702_DELEGATION_DESIGNATOR)
        {
            return Self::DelegatedTo(Address::from_slice(&code[3..]));
        }

        Self::DelegatedUnknownFormat(Bytes::copy_from_slice(code))
    }

    /// Returns the designator code delegating to `target`.
    pub fn designator(target: Address) -> Bytes {
        [&EIP7702_DELEGATION_DESIGNATOR[..], target.as_slice()].concat().into()
    }

    /// Returns the delegation target, if any.
    pub fn target(&self) -> Option<Address> {
        match self {
            Self::DelegatedTo(address) => Some(*address),
            _ => None,
        }
    }

    /// Whether the account delegates to `target`.
    pub fn is_delegated_to(&self, target: Address) -> bool {
        self.target() == Some(target)
    }
}

impl fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDelegated => f.write_str("not delegated"),
            Self::DelegatedTo(address) => write!(f, "delegated to {address}"),
            Self::DelegatedUnknownFormat(code) => write!(f, "unknown code {code}"),
        }
    }
}

/// State of the delegation lifecycle relative to a desired target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DelegationState {
    /// The status could not be read.
    Unknown,
    /// The account has no delegation.
    NotDelegated,
    /// The account delegates to the desired target.
    DelegatedCorrect,
    /// The account delegates elsewhere, or has unrecognized code.
    DelegatedWrong,
}

impl DelegationState {
    /// Classifies a [`DelegationStatus`] against the desired target.
    pub fn classify(status: &DelegationStatus, desired: Address) -> Self {
        match status {
            DelegationStatus::NotDelegated => Self::NotDelegated,
            DelegationStatus::DelegatedTo(target) if *target == desired => Self::DelegatedCorrect,
            DelegationStatus::DelegatedTo(_) | DelegationStatus::DelegatedUnknownFormat(_) => {
                Self::DelegatedWrong
            }
        }
    }
}

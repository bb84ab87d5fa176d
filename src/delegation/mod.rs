//! EIP-7702 delegation lifecycle of the controlled account.

mod authorization;
pub use authorization::build_authorization;

use crate::{
    chain::{ChainApi, ChainTransaction, Confirmation},
    chains::ChainContext,
    error::{ChainError, DelegationError},
    signers::DynSigner,
    types::{DelegationState, DelegationStatus, IDelegatedAccount, Receipt},
};
use alloy::{
    primitives::{Address, Bytes},
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of reconciling the delegation of the controlled account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationOutcome {
    /// The reached state.
    pub state: DelegationState,
    /// The delegation status after reconciliation.
    pub status: DelegationStatus,
    /// Receipts of the transactions issued, in order.
    pub receipts: Vec<Receipt>,
}

/// Manages the delegation of the controlled account on a single chain.
#[derive(Debug, Clone)]
pub struct DelegationManager {
    context: Arc<ChainContext>,
    controlled: DynSigner,
}

impl DelegationManager {
    /// Creates a new instance of [`DelegationManager`].
    pub fn new(context: Arc<ChainContext>, controlled: DynSigner) -> Self {
        Self { context, controlled }
    }

    /// The controlled account.
    pub fn account(&self) -> Address {
        self.controlled.address()
    }

    /// Reads the delegation status of the controlled account from its code.
    #[instrument(skip(self), fields(chain = %self.context.chain, account = %self.account()))]
    pub async fn status(&self) -> Result<DelegationStatus, ChainError> {
        let code = self.context.client.get_code(self.account()).await?;
        let status = DelegationStatus::from_code(&code);
        if let DelegationStatus::DelegatedUnknownFormat(code) = &status {
            warn!(%code, "Account code is not a delegation designator");
        }
        Ok(status)
    }

    /// Fails with [`DelegationError::NotDelegated`] unless the controlled account delegates to
    /// the configured target. Never changes the delegation.
    pub async fn require_delegated(&self) -> Result<(), DelegationError> {
        let status = self.status().await?;
        if status.is_delegated_to(self.context.delegation_target) {
            return Ok(());
        }
        Err(DelegationError::NotDelegated {
            account: self.account(),
            chain_id: self.context.chain_id(),
            expected: self.context.delegation_target,
            status,
        })
    }

    /// Makes the controlled account delegate to `desired`, or to the configured target.
    ///
    /// Idempotent: nothing is sent if the account already delegates to the target. An account
    /// delegating elsewhere, or holding unrecognized code, is revoked first.
    #[instrument(skip(self), fields(chain = %self.context.chain, account = %self.account()))]
    pub async fn ensure(&self, desired: Option<Address>) -> Result<DelegationOutcome, DelegationError> {
        let target = desired.unwrap_or(self.context.delegation_target);
        let _guard = self.context.lock_submission().await;

        let status = self.status().await.inspect_err(|err| {
            error!(%err, state = ?DelegationState::Unknown, "Failed to read delegation status");
        })?;

        let mut receipts = Vec::new();
        match DelegationState::classify(&status, target) {
            DelegationState::DelegatedCorrect => {
                debug!(%target, "Account already delegated");
                return Ok(DelegationOutcome {
                    state: DelegationState::DelegatedCorrect,
                    status,
                    receipts,
                });
            }
            DelegationState::DelegatedWrong => {
                warn!(%status, %target, "Account delegated to another target, revoking");
                receipts.push(self.revoke_locked().await?);
            }
            DelegationState::NotDelegated | DelegationState::Unknown => {}
        }

        receipts.push(self.delegate_locked(target).await?);

        Ok(DelegationOutcome {
            state: DelegationState::DelegatedCorrect,
            status: DelegationStatus::DelegatedTo(target),
            receipts,
        })
    }

    /// Clears the delegation of the controlled account.
    #[instrument(skip(self), fields(chain = %self.context.chain, account = %self.account()))]
    pub async fn revoke(&self) -> Result<Receipt, DelegationError> {
        let _guard = self.context.lock_submission().await;
        self.revoke_locked().await
    }

    async fn delegate_locked(&self, target: Address) -> Result<Receipt, DelegationError> {
        let account = self.account();
        let authorization =
            build_authorization(&self.context.client, &self.controlled, target).await?;
        let input = IDelegatedAccount::execute_0Call { calls: self.context.delegation_calls.clone() }
            .abi_encode();

        let receipt = self
            .submit(ChainTransaction::new(account, account, input).with_authorization(authorization))
            .await?;

        let status = self.status().await?;
        if !status.is_delegated_to(target) {
            return Err(DelegationError::AuthorizationNotApplied {
                target,
                tx_hash: receipt.tx_hash,
                status,
            });
        }

        info!(%target, tx_hash = %receipt.tx_hash, block = receipt.block_number, "Delegated account");
        Ok(receipt)
    }

    async fn revoke_locked(&self) -> Result<Receipt, DelegationError> {
        let account = self.account();
        let authorization =
            build_authorization(&self.context.client, &self.controlled, Address::ZERO).await?;

        let receipt = self
            .submit(
                ChainTransaction::new(account, account, Bytes::new())
                    .with_authorization(authorization),
            )
            .await?;

        let status = self.status().await?;
        if status != DelegationStatus::NotDelegated {
            return Err(DelegationError::AuthorizationNotApplied {
                target: Address::ZERO,
                tx_hash: receipt.tx_hash,
                status,
            });
        }

        info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "Revoked delegation");
        Ok(receipt)
    }

    /// Sends a transaction from the controlled account and waits for a successful receipt.
    async fn submit(&self, tx: ChainTransaction) -> Result<Receipt, DelegationError> {
        let client = &self.context.client;
        let settings = &self.context.settings;

        let sent = client.send_transaction(tx, &self.controlled).await?;
        match client.confirm(&sent, settings.confirmation_timeout, settings.timeout_policy).await? {
            Confirmation::Included(receipt) if receipt.success => Ok(receipt),
            Confirmation::Included(receipt) => {
                Err(DelegationError::TransactionReverted(receipt.tx_hash))
            }
            Confirmation::Unconfirmed { attempts } => {
                error!(tx_hash = %sent.tx_hash, attempts, "Delegation transaction unconfirmed");
                Err(DelegationError::Unconfirmed(sent.tx_hash))
            }
        }
    }
}

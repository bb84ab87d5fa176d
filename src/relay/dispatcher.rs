//! Submission of signed batches by the relayer.

use super::{BatchSigner, JobBuilder, RelayMetrics};
use crate::{
    chain::{ChainApi, ChainTransaction, Confirmation},
    chains::{Accounts, ChainContext},
    delegation::DelegationManager,
    error::{ChainError, DispatchError, RelayError, revert_reason},
    types::{
        IDelegatedAccount, INVALID_SIGNATURE_REASON, JobState, Receipt, RelayJob, TransferEvent,
    },
};
use alloy::{
    primitives::{Address, B256, Bytes, U256},
    sol_types::SolCall,
};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn};

/// Relays signed batches of the controlled account on a single chain.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: Arc<ChainContext>,
    accounts: Accounts,
    delegation: DelegationManager,
    signer: BatchSigner,
    metrics: Arc<RelayMetrics>,
}

impl Dispatcher {
    /// Creates a new instance of [`Dispatcher`].
    pub fn new(context: Arc<ChainContext>, accounts: Accounts) -> Self {
        let metrics =
            RelayMetrics::new_with_labels(&[("chain_id", context.chain_id().to_string())]);
        Self {
            signer: BatchSigner::new(accounts.controlled().clone()),
            delegation: DelegationManager::new(context.clone(), accounts.controlled().clone()),
            context,
            accounts,
            metrics: Arc::new(metrics),
        }
    }

    /// The chain context.
    pub fn context(&self) -> &Arc<ChainContext> {
        &self.context
    }

    /// The controlled account.
    pub fn account(&self) -> Address {
        self.accounts.controlled().address()
    }

    /// Relay metrics of the chain.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    fn builder(&self) -> JobBuilder<'_> {
        JobBuilder::new(&self.context, self.account())
    }

    /// Forwards a transfer to `recipient`.
    ///
    /// Fails with [`DelegationError::NotDelegated`](crate::error::DelegationError::NotDelegated)
    /// unless the controlled account delegates to the configured target. The delegation is
    /// checked under the submission lock, so it cannot change before the batch is sent.
    pub async fn relay_transfer(
        &self,
        event: &TransferEvent,
        recipient: Address,
    ) -> Result<Receipt, RelayError> {
        let _guard = self.context.lock_submission().await;
        self.delegation.require_delegated().await?;
        let job = self.builder().build(event, recipient).await.map_err(DispatchError::from)?;
        Ok(self.relay(job).await?)
    }

    /// Forwards `amount` of the asset to `recipient` without a triggering transfer.
    ///
    /// Checks the delegation like [`Self::relay_transfer`].
    pub async fn relay_amount(
        &self,
        recipient: Address,
        amount: U256,
    ) -> Result<Receipt, RelayError> {
        let _guard = self.context.lock_submission().await;
        self.delegation.require_delegated().await?;
        let job =
            self.builder().build_manual(recipient, amount).await.map_err(DispatchError::from)?;
        Ok(self.relay(job).await?)
    }

    /// Signs and dispatches a job. A job whose nonce went stale is rebuilt, re-signed and
    /// dispatched exactly once more.
    ///
    /// Must be called with the submission lock held.
    #[instrument(skip_all, fields(chain = %self.context.chain, job = %job.id))]
    async fn relay(&self, mut job: RelayJob) -> Result<Receipt, DispatchError> {
        let result = match self.sign_and_dispatch(&mut job).await {
            Err(err) if err.is_stale() => {
                warn!(%err, tx_hash = ?err.tx_hash(), "Batch nonce went stale, rebuilding");
                self.metrics.stale_retries.increment(1);
                match self.builder().rebuild(&mut job).await {
                    Ok(()) => self.sign_and_dispatch(&mut job).await,
                    Err(err) => Err(err.into()),
                }
            }
            result => result,
        };

        match &result {
            Ok(receipt) => {
                job.transition(JobState::Confirmed);
                self.metrics.confirmed.increment(1);
                info!(
                    job = %job.id,
                    chain_id = job.chain_id,
                    nonce = %job.nonce,
                    tx_hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    amount = %job.amount,
                    recipient = %job.recipient,
                    "Relayed batch"
                );
            }
            Err(err) => {
                job.transition(JobState::Failed);
                self.metrics.failed.increment(1);
                error!(
                    job = %job.id,
                    chain_id = job.chain_id,
                    nonce = %job.nonce,
                    tx_hash = ?err.tx_hash(),
                    revert_reason = ?err.revert_reason(),
                    attempts = job.attempts,
                    %err,
                    "Failed to relay batch"
                );
            }
        }

        result
    }

    async fn sign_and_dispatch(&self, job: &mut RelayJob) -> Result<Receipt, DispatchError> {
        self.signer.sign_job(job).await.map_err(ChainError::from)?;
        self.dispatch(job).await
    }

    /// Submits a signed job and waits for its receipt.
    ///
    /// The batch is simulated first, so that a batch that would revert is classified without
    /// spending gas.
    pub async fn dispatch(&self, job: &mut RelayJob) -> Result<Receipt, DispatchError> {
        let signature = job.signature.ok_or(DispatchError::Unsigned)?;
        let client = &self.context.client;
        let settings = &self.context.settings;

        let input = IDelegatedAccount::execute_1Call {
            calls: job.calls.clone(),
            signature: signature.as_bytes().into(),
        }
        .abi_encode();
        let tx = ChainTransaction::new(
            self.accounts.relayer().address(),
            self.account(),
            input,
        );
        job.attempts += 1;

        if let Err(err) = client.simulate(&tx).await {
            return Err(self.classify(job, err, None).await);
        }

        let sent = match client.send_transaction(tx.clone(), self.accounts.relayer()).await {
            Ok(sent) => sent,
            Err(err) if err.revert_data().is_some() => {
                return Err(self.classify(job, err, None).await);
            }
            // the transaction may have been broadcast before the error
            Err(err) => return Err(DispatchError::Unresolved { tx_hash: None, source: err }),
        };
        job.transition(JobState::Submitted);
        self.metrics.sent.increment(1);
        info!(job = %job.id, nonce = %job.nonce, tx_hash = %sent.tx_hash, "Submitted batch");

        let submitted_at = Instant::now();
        let confirmation = client
            .confirm(&sent, settings.confirmation_timeout, settings.timeout_policy)
            .await
            .map_err(|source| DispatchError::Unresolved { tx_hash: Some(sent.tx_hash), source })?;
        match confirmation {
            Confirmation::Included(receipt) if receipt.success => {
                self.metrics.confirmation_time.record(submitted_at.elapsed().as_millis() as f64);
                Ok(receipt)
            }
            Confirmation::Included(receipt) => {
                // replay the batch to recover the revert reason
                let err = match client.simulate(&tx).await {
                    Err(err) => err,
                    Ok(_) => ChainError::Reverted { data: Bytes::new() },
                };
                Err(self.classify(job, err, Some(receipt.tx_hash)).await)
            }
            Confirmation::Unconfirmed { attempts } => {
                Err(DispatchError::Unconfirmed { tx_hash: sent.tx_hash, attempts })
            }
        }
    }

    /// Classifies a failed batch.
    ///
    /// A revert is stale if the contract nonce moved past the job's nonce, a signature rejection
    /// if the account reports an invalid signature against the current nonce, and a plain revert
    /// otherwise.
    async fn classify(
        &self,
        job: &RelayJob,
        err: ChainError,
        tx_hash: Option<B256>,
    ) -> DispatchError {
        let Some(data) = err.revert_data().cloned() else { return err.into() };

        let current = match self.context.client.contract_nonce(self.account()).await {
            Ok(nonce) => nonce,
            Err(err) => return err.into(),
        };
        if current > job.nonce {
            return DispatchError::StaleNonce { signed: job.nonce, current, tx_hash };
        }

        let reason = revert_reason(&data);
        if reason == INVALID_SIGNATURE_REASON {
            DispatchError::SignatureRejected { nonce: job.nonce, tx_hash }
        } else {
            DispatchError::Reverted { reason, tx_hash }
        }
    }
}

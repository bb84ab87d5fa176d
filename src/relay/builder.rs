//! Turns inbound transfers into relay jobs.

use crate::{
    chain::ChainApi,
    chains::ChainContext,
    error::ChainError,
    types::{Call, IERC20, JobState, RelayJob, TransferEvent},
};
use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use tracing::debug;

/// Builds the call batch forwarding `amount` of the chain's asset to `recipient`.
///
/// The batch is the asset transfer, followed by an empty call to the recipient when the chain's
/// marker call is enabled.
pub fn forward_calls(context: &ChainContext, recipient: Address, amount: U256) -> Vec<Call> {
    let transfer = IERC20::transferCall { to: recipient, amount }.abi_encode();
    let mut calls = vec![Call::new(context.asset, U256::ZERO, transfer.into())];
    if context.marker_call {
        calls.push(Call::empty(recipient));
    }
    calls
}

/// Builds relay jobs for a chain.
#[derive(Debug)]
pub struct JobBuilder<'a> {
    context: &'a ChainContext,
    account: Address,
}

impl<'a> JobBuilder<'a> {
    /// Creates a new instance of [`JobBuilder`] for the delegated `account`.
    pub fn new(context: &'a ChainContext, account: Address) -> Self {
        Self { context, account }
    }

    /// Builds a job forwarding the transferred amount to `recipient`.
    ///
    /// The contract nonce is read fresh for every job.
    pub async fn build(
        &self,
        event: &TransferEvent,
        recipient: Address,
    ) -> Result<RelayJob, ChainError> {
        let chain_id = self.context.chain_id();
        let nonce = self.context.client.contract_nonce(self.account).await?;
        let job = RelayJob {
            id: event.job_id(chain_id),
            chain_id,
            source: event.from,
            amount: event.amount,
            recipient,
            calls: forward_calls(self.context, recipient, event.amount),
            nonce,
            signature: None,
            state: JobState::Created,
            attempts: 0,
        };
        debug!(job = %job.id, chain_id, %nonce, "Built relay job");
        Ok(job)
    }

    /// Builds a job that is not triggered by a transfer, with a fresh id.
    pub async fn build_manual(
        &self,
        recipient: Address,
        amount: U256,
    ) -> Result<RelayJob, ChainError> {
        self.build(&TransferEvent::new(self.account, self.account, amount), recipient).await
    }

    /// Refreshes the contract nonce of a job and drops its signature.
    pub async fn rebuild(&self, job: &mut RelayJob) -> Result<(), ChainError> {
        job.nonce = self.context.client.contract_nonce(self.account).await?;
        job.signature = None;
        job.transition(JobState::Retried);
        debug!(job = %job.id, nonce = %job.nonce, "Rebuilt relay job");
        Ok(())
    }
}

//! Relay jobs and the events that trigger them.

use super::{Call, IERC20};
use alloy::{
    primitives::{Address, B256, ChainId, Signature, U256, keccak256, wrap_fixed_bytes},
    rpc::types::Log,
    sol_types::SolEvent,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

wrap_fixed_bytes! {
    /// An id of a relay job.
    ///
    /// Derived from the triggering log when there is one, so that the same transfer always maps to
    /// the same id in the logs.
    pub struct JobId<32>;
}

/// Sequence for ids of jobs that are not triggered by a log.
static MANUAL_JOBS: AtomicU64 = AtomicU64::new(0);

impl JobId {
    /// A fresh id for a job not triggered by a log, e.g. a manual relay.
    pub fn manual(chain_id: ChainId) -> Self {
        let seq = MANUAL_JOBS.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();

        let mut preimage = [0u8; 32];
        preimage[..8].copy_from_slice(&chain_id.to_be_bytes());
        preimage[8..16].copy_from_slice(&seq.to_be_bytes());
        preimage[16..].copy_from_slice(&now.to_be_bytes());
        Self(keccak256(preimage))
    }

    /// Id for a job triggered by the log at `log_index` of `tx_hash`.
    pub fn from_log(chain_id: ChainId, tx_hash: B256, log_index: u64) -> Self {
        let mut preimage = [0u8; 48];
        preimage[..8].copy_from_slice(&chain_id.to_be_bytes());
        preimage[8..40].copy_from_slice(tx_hash.as_slice());
        preimage[40..].copy_from_slice(&log_index.to_be_bytes());
        Self(keccak256(preimage))
    }
}

/// An inbound asset transfer observed on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    /// Sender of the asset.
    pub from: Address,
    /// Receiver of the asset.
    pub to: Address,
    /// Transferred amount.
    pub amount: U256,
    /// Hash of the transaction that emitted the transfer, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// Index of the log in the block, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl TransferEvent {
    /// Creates a transfer not attached to any log.
    pub fn new(from: Address, to: Address, amount: U256) -> Self {
        Self { from, to, amount, tx_hash: None, log_index: None }
    }

    /// Decodes an ERC-20 `Transfer` log.
    pub fn decode_log(log: &Log) -> Result<Self, alloy::sol_types::Error> {
        let transfer = IERC20::Transfer::decode_log(&log.inner)?.data;
        Ok(Self {
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
        })
    }

    /// The job id for this event.
    pub fn job_id(&self, chain_id: ChainId) -> JobId {
        match (self.tx_hash, self.log_index) {
            (Some(tx_hash), Some(log_index)) => JobId::from_log(chain_id, tx_hash, log_index),
            _ => JobId::manual(chain_id),
        }
    }
}

/// Lifecycle state of a [`RelayJob`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    /// The batch was built.
    #[default]
    Created,
    /// The batch was signed against a contract nonce.
    Signed,
    /// The batch was submitted by the relayer.
    Submitted,
    /// The batch was executed.
    Confirmed,
    /// The batch failed and was dropped.
    Failed,
    /// The batch went stale and is being rebuilt.
    Retried,
}

impl JobState {
    /// Whether the state is final.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Signed => "signed",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Retried => "retried",
        };
        f.write_str(s)
    }
}

/// A batch relayed on behalf of the controlled account.
#[derive(Debug, Clone)]
pub struct RelayJob {
    /// Id of the job.
    pub id: JobId,
    /// Chain the job runs on.
    pub chain_id: ChainId,
    /// Sender of the transfer that triggered the job.
    pub source: Address,
    /// Transferred amount being forwarded.
    pub amount: U256,
    /// Receiver of the forwarded amount.
    pub recipient: Address,
    /// The call batch.
    pub calls: Vec<Call>,
    /// Contract nonce the batch is signed against.
    pub nonce: U256,
    /// Signature of the controlled account, once signed.
    pub signature: Option<Signature>,
    /// Lifecycle state.
    pub state: JobState,
    /// Number of dispatch attempts so far.
    pub attempts: u32,
}

impl RelayJob {
    /// Moves the job to `state`.
    pub fn transition(&mut self, state: JobState) {
        tracing::trace!(job = %self.id, from = %self.state, to = %state, "job transition");
        self.state = state;
    }
}

//! Signing of call batches by the controlled account.

use crate::{
    signers::DynSigner,
    types::{Call, JobState, RelayJob, calls_digest},
};
use alloy::{
    primitives::{Address, Signature, U256},
    signers::Signer,
};

/// Signs call batches with the key of the controlled account.
#[derive(Debug, Clone)]
pub struct BatchSigner {
    signer: DynSigner,
}

impl BatchSigner {
    /// Creates a new instance of [`BatchSigner`].
    pub fn new(signer: DynSigner) -> Self {
        Self { signer }
    }

    /// Address of the signer.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs the digest of `calls` at contract nonce `nonce`.
    ///
    /// The digest is signed as an EIP-191 personal message, which is what the account recovers
    /// the signer from.
    pub async fn sign(
        &self,
        calls: &[Call],
        nonce: U256,
    ) -> Result<Signature, alloy::signers::Error> {
        let digest = calls_digest(nonce, calls);
        self.signer.sign_message(digest.as_slice()).await
    }

    /// Signs a job against its current nonce.
    pub async fn sign_job(&self, job: &mut RelayJob) -> Result<(), alloy::signers::Error> {
        job.signature = Some(self.sign(&job.calls, job.nonce).await?);
        job.transition(JobState::Signed);
        Ok(())
    }
}

/// Recovers the signer of a batch signature.
pub fn recover_batch_signer(signature: &Signature, calls: &[Call], nonce: U256) -> Option<Address> {
    signature.recover_address_from_msg(calls_digest(nonce, calls)).ok()
}

/// Whether `signature` is `expected`'s signature over `calls` at `nonce`.
pub fn verify_batch(signature: &Signature, calls: &[Call], nonce: U256, expected: Address) -> bool {
    recover_batch_signer(signature, calls, nonce) == Some(expected)
}

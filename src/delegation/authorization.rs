//! EIP-7702 authorizations signed by the controlled account.

use crate::{chain::ChainApi, error::DelegationError, signers::DynSigner};
use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, U256},
    signers::Signer,
};
use tracing::{debug, instrument};

/// Builds and signs an authorization delegating the controlled account to `target`.
///
/// The account nonce is read fresh. The controlled account sends the carrying transaction
/// itself, and the sender nonce is incremented before authorizations are processed, so the
/// authorization uses the pending transaction count plus one.
///
/// An authorization for [`Address::ZERO`] clears the delegation.
#[instrument(skip_all, fields(chain_id = chain.chain_id(), %target))]
pub async fn build_authorization(
    chain: &dyn ChainApi,
    controlled: &DynSigner,
    target: Address,
) -> Result<SignedAuthorization, DelegationError> {
    let nonce = chain.get_transaction_count(controlled.address()).await?;
    let authorization =
        Authorization { chain_id: U256::from(chain.chain_id()), address: target, nonce: nonce + 1 };

    let signature = controlled.sign_hash(&authorization.signature_hash()).await?;
    debug!(nonce = authorization.nonce, "Signed authorization");

    Ok(authorization.into_signed(signature))
}

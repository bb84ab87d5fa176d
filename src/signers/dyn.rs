//! Signer abstracted over a local key or an AWS KMS key.
use alloy::{
    network::{FullSigner, TxSigner},
    primitives::{Address, ChainId, Signature},
    signers::{aws::AwsSigner, local::PrivateKeySigner},
};
use aws_config::BehaviorVersion;
use std::{fmt, ops::Deref, str::FromStr, sync::Arc};

/// A signer that can sign transactions, hashes and messages.
#[derive(Clone)]
pub struct DynSigner(pub Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for DynSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynSigner").field(&self.address()).finish()
    }
}

impl DynSigner {
    /// Loads a signer from a raw private key, or from AWS KMS if `key` is not a private key.
    pub async fn load(key: &str, chain_id: Option<ChainId>) -> eyre::Result<Self> {
        match Self::from_signing_key(key) {
            Ok(signer) => Ok(signer),
            Err(_) => Self::from_kms(key, chain_id).await,
        }
    }

    /// Load a private key.
    pub fn from_signing_key(key: &str) -> eyre::Result<Self> {
        Ok(Self::from(PrivateKeySigner::from_str(key)?))
    }

    /// Load a signer from AWS KMS.
    pub async fn from_kms(key_id: &str, chain_id: Option<ChainId>) -> eyre::Result<Self> {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_kms::Client::new(&config);
        Ok(Self(Arc::new(AwsSigner::new(client, key_id.to_string(), chain_id).await?)))
    }

    /// Returns the signer's Ethereum Address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }
}

impl From<PrivateKeySigner> for DynSigner {
    fn from(signer: PrivateKeySigner) -> Self {
        Self(Arc::new(signer))
    }
}

impl Deref for DynSigner {
    type Target = dyn FullSigner<Signature> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

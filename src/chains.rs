//! The chains the relay operates on.

use crate::{
    chain::{ChainApi, ChainClient},
    config::{ChainConfig, RelayConfig, RelaySettings, SecretsConfig},
    error::{ConfigError, RelayError},
    signers::DynSigner,
    types::Call,
};
use alloy::primitives::{Address, ChainId, map::HashMap};
use alloy_chains::Chain;
use itertools::Itertools;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// The two keys of the relay.
///
/// The controlled account signs authorizations and batch digests. The relayer only pays for and
/// submits signed batches.
#[derive(Debug, Clone)]
pub struct Accounts {
    controlled: DynSigner,
    relayer: DynSigner,
}

impl Accounts {
    /// Creates a new instance of [`Accounts`], rejecting identical keys.
    pub fn new(controlled: DynSigner, relayer: DynSigner) -> Result<Self, ConfigError> {
        if controlled.address() == relayer.address() {
            return Err(ConfigError::SameKeys);
        }
        Ok(Self { controlled, relayer })
    }

    /// Loads both signers from local keys or AWS KMS key ids.
    pub async fn load(secrets: &SecretsConfig) -> eyre::Result<Self> {
        let controlled = DynSigner::load(&secrets.controlled_key, None).await?;
        let relayer = DynSigner::load(&secrets.relayer_key, None).await?;
        Ok(Self::new(controlled, relayer)?)
    }

    /// The controlled account.
    pub fn controlled(&self) -> &DynSigner {
        &self.controlled
    }

    /// The relayer.
    pub fn relayer(&self) -> &DynSigner {
        &self.relayer
    }
}

/// Everything the relay needs to operate on a chain. Immutable after construction.
#[derive(Debug)]
pub struct ChainContext {
    /// The chain.
    pub chain: Chain,
    /// Client for the chain.
    pub client: ChainClient,
    /// The implementation contract the controlled account delegates to.
    pub delegation_target: Address,
    /// The bridged asset.
    pub asset: Address,
    /// Receiver of forwarded assets.
    pub recipient: Address,
    /// Whether batches also call the recipient with empty calldata.
    pub marker_call: bool,
    /// Calls executed in the delegation transaction.
    pub delegation_calls: Vec<Call>,
    /// Relay settings.
    pub settings: RelaySettings,
    /// Serializes state-changing operations on this chain.
    submission_lock: Mutex<()>,
}

impl ChainContext {
    /// Creates a new instance of [`ChainContext`].
    pub fn new(
        chain: Chain,
        client: ChainClient,
        config: &ChainConfig,
        settings: RelaySettings,
    ) -> Self {
        Self {
            chain,
            client,
            delegation_target: config.delegation_target,
            asset: config.asset,
            recipient: config.recipient,
            marker_call: config.marker_call,
            delegation_calls: config.delegation_calls.clone(),
            settings,
            submission_lock: Mutex::new(()),
        }
    }

    /// The chain id.
    pub fn chain_id(&self) -> ChainId {
        self.chain.id()
    }

    /// Acquires the submission lock of the chain.
    ///
    /// Held for the whole of a delegation change or a batch relay, so that no two operations
    /// read the same account or contract nonce.
    pub async fn lock_submission(&self) -> MutexGuard<'_, ()> {
        self.submission_lock.lock().await
    }
}

/// A collection of [`ChainContext`]s.
#[derive(Debug, Clone, Default)]
pub struct Chains {
    chains: HashMap<Chain, Arc<ChainContext>>,
}

impl Chains {
    /// Creates a new instance of [`Chains`] from connected contexts.
    pub fn new(contexts: impl IntoIterator<Item = ChainContext>) -> Self {
        Self {
            chains: contexts.into_iter().map(|context| (context.chain, Arc::new(context))).collect(),
        }
    }

    /// Connects to every configured chain.
    ///
    /// Fails if an endpoint reports a chain id different from the chain it is configured for.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        let contexts =
            futures_util::future::try_join_all(config.chains.iter().map(|(chain, chain_config)| {
                async move {
                    let client = ChainClient::connect(&chain_config.endpoint).await?;
                    if client.chain_id() != chain.id() {
                        return Err(ConfigError::ChainIdMismatch {
                            configured: *chain,
                            actual: client.chain_id(),
                        }
                        .into());
                    }

                    info!(%chain, endpoint = %chain_config.endpoint, "Connected to chain");
                    Ok::<_, RelayError>(ChainContext::new(
                        *chain,
                        client,
                        chain_config,
                        config.relay,
                    ))
                }
            }))
            .await?;

        Ok(Self::new(contexts))
    }

    /// Get the context of a chain.
    pub fn get(&self, chain: Chain) -> Result<Arc<ChainContext>, ConfigError> {
        self.chains.get(&chain).cloned().ok_or(ConfigError::UnknownChain(chain))
    }

    /// Iterates over all chains, ordered by chain id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChainContext>> {
        self.chains.values().sorted_by_key(|context| context.chain_id())
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether there are no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

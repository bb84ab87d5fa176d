//! Relay configuration.

use crate::{
    constants::{
        DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_MAX_TRANSIENT_RETRIES, DEFAULT_QUEUE_CAPACITY,
        DEFAULT_REBROADCAST_ATTEMPTS, DEFAULT_RETRY_BACKOFF,
    },
    error::ConfigError,
    types::Call,
};
use alloy::primitives::{Address, map::HashMap};
use alloy_chains::Chain;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use url::Url;

/// Relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Chains the relay operates on.
    #[serde(with = "crate::serde::hash_map")]
    pub chains: HashMap<Chain, ChainConfig>,
    /// Relay settings shared by all chains.
    #[serde(default)]
    pub relay: RelaySettings,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Secrets, never read from or written to the config file.
    #[serde(skip)]
    pub secrets: SecretsConfig,
}

/// Configuration of a single chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// RPC endpoint of the chain. Websocket endpoints are used for transfer subscriptions.
    pub endpoint: Url,
    /// The implementation contract the controlled account delegates to.
    pub delegation_target: Address,
    /// The bridged asset that is forwarded.
    pub asset: Address,
    /// Receiver of forwarded assets.
    pub recipient: Address,
    /// Whether each relayed batch also calls the recipient with empty calldata.
    #[serde(default = "default_marker_call")]
    pub marker_call: bool,
    /// Calls executed by the controlled account in the delegation transaction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delegation_calls: Vec<Call>,
}

fn default_marker_call() -> bool {
    true
}

/// What to do when a transaction is not included within the confirmation timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Re-send the same signed transaction up to `attempts` times, waiting again after each.
    Rebroadcast {
        /// Maximum number of rebroadcasts.
        attempts: u32,
    },
    /// Give up after the first timeout.
    Fail,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::Rebroadcast { attempts: DEFAULT_REBROADCAST_ATTEMPTS }
    }
}

/// Relay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// How long to wait for a transaction to be included.
    #[serde(with = "crate::serde::duration")]
    pub confirmation_timeout: Duration,
    /// What to do when the wait times out.
    pub timeout_policy: TimeoutPolicy,
    /// Capacity of each per-chain trigger queue.
    pub queue_capacity: usize,
    /// How often a job failing with a transient error is retried.
    pub max_transient_retries: u32,
    /// Initial backoff between transient retries, doubled after each retry.
    #[serde(with = "crate::serde::duration")]
    pub retry_backoff: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            timeout_policy: TimeoutPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Port to serve Prometheus metrics on. Metrics are not exported if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Signer keys. Either a hex private key or an AWS KMS key id.
#[derive(Clone, Default)]
pub struct SecretsConfig {
    /// Key of the controlled account.
    pub controlled_key: String,
    /// Key of the relayer.
    pub relayer_key: String,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig").finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Adds or replaces a chain.
    pub fn with_chain(mut self, chain: Chain, config: ChainConfig) -> Self {
        self.chains.insert(chain, config);
        self
    }

    /// Sets the confirmation timeout.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.relay.confirmation_timeout = timeout;
        self
    }

    /// Sets the timeout policy.
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.relay.timeout_policy = policy;
        self
    }

    /// Sets the capacity of trigger queues.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.relay.queue_capacity = capacity;
        self
    }

    /// Sets the port to serve metrics on.
    pub fn with_metrics_port(mut self, port: Option<u16>) -> Self {
        self.metrics.port = port.or(self.metrics.port);
        self
    }

    /// Sets the key of the controlled account.
    pub fn with_controlled_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.secrets.controlled_key = key;
        }
        self
    }

    /// Sets the key of the relayer.
    pub fn with_relayer_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.secrets.relayer_key = key;
        }
        self
    }

    /// Checks the configuration for missing values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }

        for (chain, config) in &self.chains {
            for (field, address) in [
                ("delegation_target", config.delegation_target),
                ("asset", config.asset),
                ("recipient", config.recipient),
            ] {
                if address.is_zero() {
                    return Err(ConfigError::MissingAddress { chain: *chain, field });
                }
            }
        }

        if self.secrets.controlled_key.is_empty() {
            return Err(ConfigError::MissingSecret("controlled key"));
        }
        if self.secrets.relayer_key.is_empty() {
            return Err(ConfigError::MissingSecret("relayer key"));
        }
        if self.secrets.controlled_key.trim_start_matches("0x")
            == self.secrets.relayer_key.trim_start_matches("0x")
        {
            return Err(ConfigError::SameKeys);
        }

        Ok(())
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

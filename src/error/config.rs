use alloy::primitives::ChainId;
use alloy_chains::Chain;

/// Errors in the relay configuration. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No chains are configured.
    #[error("no chains configured")]
    NoChains,
    /// The chain is not configured.
    #[error("chain {0} is not configured")]
    UnknownChain(Chain),
    /// The endpoint of a chain reports a different chain id.
    #[error("endpoint for chain {configured} reports chain id {actual}")]
    ChainIdMismatch {
        /// The configured chain.
        configured: Chain,
        /// The chain id reported by the endpoint.
        actual: ChainId,
    },
    /// A required address is zero.
    #[error("missing {field} address for chain {chain}")]
    MissingAddress {
        /// The chain.
        chain: Chain,
        /// Name of the missing field.
        field: &'static str,
    },
    /// A required secret is not set.
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),
    /// The controlled account and the relayer use the same key.
    #[error("controlled account and relayer must use distinct keys")]
    SameKeys,
}

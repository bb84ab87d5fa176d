use alloy::primitives::{Address, ChainId, address};

/// Key of the controlled account.
pub const CONTROLLED_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Key of the relayer.
pub const RELAYER_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

/// A key unrelated to the relay.
pub const OTHER_KEY: &str = "0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6";

/// Chain id of the test chain (Base Sepolia).
pub const CHAIN_ID: ChainId = 84532;

/// The implementation contract accounts delegate to.
pub const IMPLEMENTATION: Address = address!("0x000000000000000000000000000000000000c0de");

/// Another implementation contract.
pub const OTHER_IMPLEMENTATION: Address = address!("0x000000000000000000000000000000000000bad0");

/// The bridged asset.
pub const ASSET: Address = address!("0x0000000000000000000000000000000000a55e70");

/// Receiver of forwarded assets.
pub const RECIPIENT: Address = address!("0x00000000000000000000000000000000000f0a1d");

/// Sender of inbound transfers.
pub const SOURCE: Address = address!("0x0000000000000000000000000000000000b41d9e");

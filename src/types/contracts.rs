//! Contract bindings used by the relay.

use alloy::sol;
use serde::{Deserialize, Serialize};

sol! {
    /// A single call executed by the delegated account.
    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct Call {
        /// The call target.
        address to;
        /// Amount of native value to send to the target.
        uint256 value;
        /// The calldata bytes.
        bytes data;
    }

    /// Implementation contract the controlled account delegates to.
    ///
    /// Batches executed through the signed entry point must be signed by the delegated account
    /// itself over `keccak256(abi.encodePacked(nonce, encodedCalls))`.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IDelegatedAccount {
        /// Emitted for every executed batch.
        event BatchExecuted(uint256 indexed nonce, Call[] calls);

        /// Executes a batch. Callable by the account itself only.
        function execute(Call[] calls) external payable;

        /// Executes a batch on behalf of the account, authenticated by `signature`.
        function execute(Call[] calls, bytes signature) external payable;

        /// The nonce of the next signed batch.
        function nonce() external view returns (uint256);
    }

    /// Minimal ERC-20 interface.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 amount);

        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Revert reason of the signed entry point when the recovered signer is not the account.
pub const INVALID_SIGNATURE_REASON: &str = "Invalid signature";

/// Revert reason of the unsigned entry point when the caller is not the account.
pub const INVALID_AUTHORITY_REASON: &str = "Invalid authority";

/// Revert reason when one of the calls in the batch reverted.
pub const CALL_REVERTED_REASON: &str = "Call reverted";

//! Call type executed by the delegated account, and the canonical batch encoding.

pub use super::contracts::Call;
use alloy::primitives::{Address, B256, Bytes, U256, keccak256};

impl Call {
    /// Creates a new [`Call`].
    pub fn new(to: Address, value: U256, data: Bytes) -> Self {
        Self { to, value, data }
    }

    /// A zero-value call with empty calldata.
    pub fn empty(to: Address) -> Self {
        Self { to, value: U256::ZERO, data: Bytes::new() }
    }

    /// Packed length of this call, see [`encode_calls`].
    fn packed_len(&self) -> usize {
        20 + 32 + self.data.len()
    }
}

/// Encodes the calls the way the implementation contract does before hashing.
///
/// ```solidity
/// encodedCalls = abi.encodePacked(encodedCalls, calls[i].to, calls[i].value, calls[i].data);
/// ```
pub fn encode_calls(calls: &[Call]) -> Bytes {
    let mut buf = Vec::with_capacity(calls.iter().map(Call::packed_len).sum());
    for call in calls {
        buf.extend_from_slice(call.to.as_slice());
        buf.extend_from_slice(&call.value.to_be_bytes::<32>());
        buf.extend_from_slice(&call.data);
    }
    buf.into()
}

/// Computes the digest signed by the controlled account for a batch.
///
/// ```solidity
/// bytes32 digest = keccak256(abi.encodePacked(nonce, encodedCalls));
/// ```
pub fn batch_digest(nonce: U256, encoded_calls: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(32 + encoded_calls.len());
    preimage.extend_from_slice(&nonce.to_be_bytes::<32>());
    preimage.extend_from_slice(encoded_calls);
    keccak256(preimage)
}

/// Shorthand for `batch_digest(nonce, encode_calls(calls))`.
pub fn calls_digest(nonce: U256, calls: &[Call]) -> B256 {
    batch_digest(nonce, &encode_calls(calls))
}

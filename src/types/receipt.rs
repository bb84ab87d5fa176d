use alloy::{
    network::ReceiptResponse,
    primitives::{B256, BlockNumber},
    rpc::types::TransactionReceipt,
};
use serde::{Deserialize, Serialize};

/// Outcome of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Hash of the transaction.
    pub tx_hash: B256,
    /// Block the transaction was included in.
    pub block_number: BlockNumber,
    /// Whether the transaction executed successfully.
    pub success: bool,
}

impl From<&TransactionReceipt> for Receipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            success: receipt.status(),
        }
    }
}

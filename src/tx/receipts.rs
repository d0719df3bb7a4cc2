use crate::contract::bindings::decode_revert_reason;
use crate::rpc::{NodeClient, RpcError};
use crate::types::TxHash;
use alloy::network::ReceiptResponse;
use async_trait::async_trait;
use tracing::debug;

/// Outcome of one receipt lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Not yet included
    Pending,
    Success { block_number: u64 },
    Reverted { reason: Option<String> },
}

/// Source of inclusion receipts
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, RpcError>;
}

/// Receipts from `eth_getTransactionReceipt`
///
/// A reverted receipt carries no reason, so the transaction is replayed with
/// `eth_call` at its inclusion block and the revert payload decoded. A replay
/// that fails or succeeds yields `reason: None`.
pub struct RpcReceiptSource {
    node: NodeClient,
}

impl RpcReceiptSource {
    pub fn new(node: NodeClient) -> Self {
        Self { node }
    }

    async fn revert_reason(&self, tx_hash: &TxHash, block_number: Option<u64>) -> Option<String> {
        let sent = match self.node.sent_transaction(*tx_hash).await {
            Ok(Some(sent)) => sent,
            Ok(None) => return None,
            Err(e) => {
                debug!(tx_hash = %tx_hash, error = %e, "revert replay lookup failed");
                return None;
            }
        };

        match self.node.call_at(&sent.into_request(), block_number).await {
            Ok(_) => None,
            Err(e) => reason_from_replay(&e),
        }
    }
}

/// Reason carried by a failed replay: decoded revert data first, then the
/// node's "execution reverted: <reason>" message
fn reason_from_replay(err: &RpcError) -> Option<String> {
    if let Some(reason) = err.revert_data().and_then(|data| decode_revert_reason(data)) {
        return Some(reason);
    }
    match err {
        RpcError::Response { message, .. } => message
            .strip_prefix("execution reverted: ")
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl ReceiptSource for RpcReceiptSource {
    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, RpcError> {
        let receipt = match self.node.receipt(*tx_hash).await? {
            Some(receipt) => receipt,
            None => return Ok(ReceiptStatus::Pending),
        };

        let block_number = ReceiptResponse::block_number(&receipt);
        if ReceiptResponse::status(&receipt) {
            // some nodes hand out receipts for pending blocks
            return Ok(match block_number {
                Some(block_number) => ReceiptStatus::Success { block_number },
                None => ReceiptStatus::Pending,
            });
        }

        let reason = self.revert_reason(tx_hash, block_number).await;
        Ok(ReceiptStatus::Reverted { reason })
    }
}

use crate::errors::ClientError;
use crate::rpc::NodeClient;
use crate::types::{Address, TxHash, Wei};
use alloy::network::TransactionBuilder;
use alloy::primitives::Bytes;
use alloy::rpc::types::eth::TransactionRequest;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The account holder declined; never retried
    #[error("Signature rejected by user")]
    Rejected,

    #[error("Signer transport error: {0}")]
    Transport(String),
}

impl From<SignerError> for ClientError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Rejected => ClientError::UserRejectedSignature,
            SignerError::Transport(msg) => ClientError::Network(msg),
        }
    }
}

/// Unsigned call ready for the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: Wei,
}

/// Whatever holds the key: decides, signs and broadcasts
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_and_send(&self, tx: &PreparedTransaction) -> Result<TxHash, SignerError>;
}

/// Signs through the node with `eth_sendTransaction` from an unlocked account
pub struct RpcSigner {
    node: NodeClient,
    account: Address,
}

impl RpcSigner {
    pub fn new(node: NodeClient, account: Address) -> Self {
        Self { node, account }
    }
}

#[async_trait]
impl TransactionSigner for RpcSigner {
    fn address(&self) -> Address {
        self.account
    }

    async fn sign_and_send(&self, tx: &PreparedTransaction) -> Result<TxHash, SignerError> {
        let request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_input(tx.data.clone())
            .with_value(tx.value);

        let hash = self.node.send_transaction(request).await.map_err(|e| {
            if e.is_user_rejection() {
                SignerError::Rejected
            } else {
                SignerError::Transport(e.to_string())
            }
        })?;
        debug!(tx_hash = %hash, "eth_sendTransaction accepted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn signer(server: &mockito::ServerGuard) -> RpcSigner {
        let node = NodeClient::connect(&server.url(), Duration::from_secs(5)).unwrap();
        RpcSigner::new(node, Address::repeat_byte(0xaa))
    }

    fn prepared() -> PreparedTransaction {
        PreparedTransaction {
            from: Address::repeat_byte(0xaa),
            to: Address::repeat_byte(0x11),
            data: Bytes::from_static(&[0x2e, 0x1a, 0x7d, 0x4d]),
            value: Wei::from(150_000_000_000_000_000u64),
        }
    }

    #[tokio::test]
    async fn test_send_returns_hash() {
        let mut server = mockito::Server::new_async().await;
        let hash = format!("0x{}", "ab".repeat(32));
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJson(json!({ "method": "eth_sendTransaction" })),
                mockito::Matcher::Regex(r#""value":"0x214e8348c4f0000""#.to_string()),
                mockito::Matcher::Regex(r#""input":"0x2e1a7d4d""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"jsonrpc":"2.0","id":0,"result":"{}"}}"#, hash))
            .create_async()
            .await;

        let tx_hash = signer(&server).sign_and_send(&prepared()).await.unwrap();
        assert_eq!(tx_hash, TxHash::repeat_byte(0xab));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"error":{"code":4001,"message":"User rejected the request."}}"#,
            )
            .create_async()
            .await;

        let err = signer(&server).sign_and_send(&prepared()).await.unwrap_err();
        assert_eq!(err, SignerError::Rejected);
        assert_eq!(ClientError::from(err), ClientError::UserRejectedSignature);
    }

    #[tokio::test]
    async fn test_other_errors_are_transport() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"error":{"code":-32000,"message":"insufficient funds"}}"#,
            )
            .create_async()
            .await;

        let err = signer(&server).sign_and_send(&prepared()).await.unwrap_err();
        assert!(matches!(err, SignerError::Transport(msg) if msg.contains("insufficient funds")));
    }
}

use super::errors::RpcError;
use crate::metrics::{metrics, Timer};
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::eth::{BlockId, TransactionReceipt, TransactionRequest};
use alloy::transports::http::Http;
use alloy::transports::TransportResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::IntoFuture;
use std::time::Duration;
use tracing::trace;

pub type HttpProvider = RootProvider<Http<reqwest::Client>>;

/// Read-only `eth_call` channel
///
/// The contract reader only needs this, so its tests run against an
/// in-memory node instead of HTTP.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, RpcError>;
}

/// Fields of a mined transaction needed to replay it with `eth_call`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentTransaction {
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub input: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl SentTransaction {
    pub fn into_request(self) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(self.from)
            .with_input(self.input)
            .with_value(self.value);
        match self.to {
            Some(to) => request.with_to(to),
            None => request,
        }
    }
}

/// JSON-RPC node over HTTP; cheap to clone
///
/// Every request is bounded by the configured timeout and timed into the
/// RPC latency histogram.
#[derive(Clone)]
pub struct NodeClient {
    provider: HttpProvider,
    timeout: Duration,
}

impl NodeClient {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let parsed: reqwest::Url = url
            .parse()
            .map_err(|e| RpcError::Transport(format!("Invalid RPC URL {}: {}", url, e)))?;
        Ok(Self {
            provider: ProviderBuilder::new().on_http(parsed),
            timeout,
        })
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    async fn bounded<T, F>(&self, method: &'static str, request: F) -> Result<T, RpcError>
    where
        F: IntoFuture<Output = TransportResult<T>>,
    {
        trace!(method, "rpc request");
        let timer = Timer::new();
        let result = tokio::time::timeout(self.timeout, request).await;
        timer.observe_duration(&metrics().rpc_latency);

        match result {
            Ok(response) => response.map_err(RpcError::from),
            Err(_) => Err(RpcError::Transport(format!(
                "{} timed out after {}ms",
                method,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        self.bounded("eth_chainId", self.provider.get_chain_id())
            .await
    }

    /// `eth_call`, against the latest block unless `block_number` is given
    pub async fn call_at(
        &self,
        request: &TransactionRequest,
        block_number: Option<u64>,
    ) -> Result<Bytes, RpcError> {
        let call = self.provider.call(request);
        let call = match block_number {
            Some(number) => call.block(BlockId::number(number)),
            None => call,
        };
        self.bounded("eth_call", call).await
    }

    /// `eth_sendTransaction` from an account the node holds unlocked
    pub async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, RpcError> {
        let pending = self
            .bounded("eth_sendTransaction", self.provider.send_transaction(request))
            .await?;
        Ok(*pending.tx_hash())
    }

    /// `None` while the transaction is not yet included
    pub async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>, RpcError> {
        self.bounded(
            "eth_getTransactionReceipt",
            self.provider.get_transaction_receipt(tx_hash),
        )
        .await
    }

    pub async fn sent_transaction(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<SentTransaction>, RpcError> {
        self.bounded(
            "eth_getTransactionByHash",
            self.provider
                .raw_request::<_, Option<SentTransaction>>("eth_getTransactionByHash".into(), (tx_hash,)),
        )
        .await
    }
}

#[async_trait]
impl CallTransport for NodeClient {
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, RpcError> {
        let request = TransactionRequest::default().with_to(to).with_input(input);
        self.call_at(&request, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(server: &mockito::ServerGuard) -> NodeClient {
        NodeClient::connect(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_chain_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({ "method": "eth_chainId" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":"0x7a69"}"#)
            .create_async()
            .await;

        assert_eq!(node(&server).chain_id().await.unwrap(), 31337);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_call_returns_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJson(json!({ "method": "eth_call" })),
                mockito::Matcher::Regex(r#""input":"0x771602f7""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"jsonrpc":"2.0","id":0,"result":"0x{}"}}"#,
                "00".repeat(31) + "2a"
            ))
            .create_async()
            .await;

        let out = node(&server)
            .call(Address::repeat_byte(0x11), Bytes::from_static(&[0x77, 0x16, 0x02, 0xf7]))
            .await
            .unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(out[31], 0x2a);
    }

    #[tokio::test]
    async fn test_error_object_keeps_revert_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"error":{"code":3,"message":"execution reverted","data":"0x08c379a0"}}"#,
            )
            .create_async()
            .await;

        let err = node(&server)
            .call(Address::repeat_byte(0x11), Bytes::new())
            .await
            .unwrap_err();
        assert!(err.is_revert());
        assert_eq!(
            err.revert_data(),
            Some(&Bytes::from_static(&[0x08, 0xc3, 0x79, 0xa0]))
        );
    }

    #[tokio::test]
    async fn test_http_failure_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .create_async()
            .await;

        let err = node(&server).chain_id().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_missing_receipt_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":null}"#)
            .create_async()
            .await;

        let receipt = node(&server)
            .receipt(TxHash::repeat_byte(0x42))
            .await
            .unwrap();
        assert!(receipt.is_none());
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            NodeClient::connect("not a url", Duration::from_secs(1)),
            Err(RpcError::Transport(_))
        ));
    }

    #[test]
    fn test_sent_transaction_replay_request() {
        let sent: SentTransaction = serde_json::from_value(json!({
            "from": "0x70997970c51812dc3a010c7d01b50e0d17dc79c8",
            "to": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "input": "0xa0712d68",
            "value": "0x214e8348c4f0000",
            "nonce": "0x3"
        }))
        .unwrap();
        assert_eq!(sent.value, U256::from(150_000_000_000_000_000u64));

        let request = sent.clone().into_request();
        assert_eq!(request.from, Some(sent.from));
        assert_eq!(request.value, Some(sent.value));
        assert_eq!(request.input.input().cloned(), Some(sent.input));
    }
}

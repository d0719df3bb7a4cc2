//! Error taxonomy for client operations
//!
//! Local errors (`NotConnected`, `Validation`, `OperationInFlight`) are
//! resolved before any network call. Everything else surfaces as a
//! dismissable notification and leaves the controller in `Failed`.
//! Nothing here is retried automatically; retry is always a user action.

use crate::rpc::RpcError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No signer is available; blocks submission before any network call
    #[error("Wallet not connected")]
    NotConnected,

    /// Quantity or argument outside the allowed bound
    #[error("Validation error: {0}")]
    Validation(String),

    /// The signer declined to sign
    #[error("Signature rejected by user")]
    UserRejectedSignature,

    /// Included on chain but reverted
    #[error("{}", revert_message(.reason.as_deref()))]
    ChainReverted { reason: Option<String> },

    /// Transport/RPC failure while submitting, waiting or reading
    #[error("Network error: {0}")]
    Network(String),

    /// Token metadata could not be resolved; the item renders a placeholder
    #[error("Metadata fetch failed: {0}")]
    MetadataFetch(String),

    /// A submission is already in flight on this controller
    #[error("Operation already in flight")]
    OperationInFlight,

    /// A contract response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Text shown for a reverted transaction, with the reason when one decoded
pub fn revert_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("Transaction reverted: {}", reason),
        None => "Transaction reverted".to_string(),
    }
}

impl ClientError {
    /// Errors resolved without touching the network
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Validation(_) | Self::OperationInFlight
        )
    }

    /// Category label for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Validation(_) => "validation",
            Self::UserRejectedSignature => "user_rejected",
            Self::ChainReverted { .. } => "chain_reverted",
            Self::Network(_) => "network",
            Self::MetadataFetch(_) => "metadata",
            Self::OperationInFlight => "in_flight",
            Self::Decode(_) => "decode",
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Decode(msg) => ClientError::Decode(msg),
            other => ClientError::Network(other.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

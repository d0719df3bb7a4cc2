use alloy::primitives::Bytes;
use alloy::transports::{RpcError as TransportFailure, TransportError};
use thiserror::Error;

/// EIP-1193 "user rejected request"
pub const USER_REJECTED_CODE: i64 = 4001;

/// Geth-style "execution reverted" with revert data attached
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Node request errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Connection, TLS, timeout or non-2xx HTTP status
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error object returned by the node; `data` holds revert bytes when attached
    #[error("RPC response error: {message} (code: {code})")]
    Response {
        code: i64,
        message: String,
        data: Option<Bytes>,
    },

    /// Malformed envelope or result payload
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RpcError {
    pub fn is_user_rejection(&self) -> bool {
        match self {
            Self::Response { code, message, .. } => {
                *code == USER_REJECTED_CODE || message.to_lowercase().contains("user rejected")
            }
            _ => false,
        }
    }

    /// True when the node reports the call as reverted rather than failed
    pub fn is_revert(&self) -> bool {
        match self {
            Self::Response { code, message, .. } => {
                *code == EXECUTION_REVERTED_CODE || message.contains("revert")
            }
            _ => false,
        }
    }

    /// Revert payload, when the node attached one
    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::Response { data: Some(data), .. } if !data.is_empty() => Some(data),
            _ => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Response { .. } => "response",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportFailure::ErrorResp(payload) => Self::Response {
                code: payload.code,
                data: payload.as_revert_data(),
                message: payload.message.to_string(),
            },
            err @ (TransportFailure::DeserError { .. } | TransportFailure::NullResp) => {
                Self::Decode(err.to_string())
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

use crate::errors::{revert_message, ClientError};
use crate::types::TxHash;
use std::fmt;

/// Why a submission settled as failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    UserRejected,
    ChainReverted { reason: Option<String> },
    Network(String),
}

impl FailureKind {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::ChainReverted { .. } => "chain_reverted",
            Self::Network(_) => "network",
        }
    }

    pub fn to_error(&self) -> ClientError {
        match self {
            Self::UserRejected => ClientError::UserRejectedSignature,
            Self::ChainReverted { reason } => ClientError::ChainReverted {
                reason: reason.clone(),
            },
            Self::Network(msg) => ClientError::Network(msg.clone()),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRejected => write!(f, "Transaction rejected in wallet"),
            Self::ChainReverted { reason } => f.write_str(&revert_message(reason.as_deref())),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

/// Lifecycle of one submission on a controller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    /// Waiting on the signer
    Submitting,
    AwaitingConfirmation {
        tx_hash: TxHash,
    },
    Confirmed {
        tx_hash: TxHash,
    },
    /// `tx_hash` is set when the failure happened after broadcast
    Failed {
        kind: FailureKind,
        tx_hash: Option<TxHash>,
    },
    /// Broadcast, but no receipt arrived before the confirmation deadline
    StillPending {
        tx_hash: TxHash,
    },
}

impl TransactionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Self::Confirmed { .. } => "confirmed",
            Self::Failed { .. } => "failed",
            Self::StillPending { .. } => "still_pending",
        }
    }

    /// States that refuse a new submission
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::AwaitingConfirmation { .. } | Self::StillPending { .. }
        )
    }

    /// Terminal for one submission: the handle resolves on these
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Confirmed { .. } | Self::Failed { .. } | Self::StillPending { .. }
        )
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::AwaitingConfirmation { tx_hash }
            | Self::Confirmed { tx_hash }
            | Self::StillPending { tx_hash } => Some(*tx_hash),
            Self::Failed { tx_hash, .. } => *tx_hash,
            Self::Idle | Self::Submitting => None,
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tx_hash() {
            Some(hash) => write!(f, "{}({})", self.name(), hash),
            None => f.write_str(self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_states() {
        let hash = TxHash::repeat_byte(1);
        assert!(!TransactionState::Idle.is_in_flight());
        assert!(TransactionState::Submitting.is_in_flight());
        assert!(TransactionState::AwaitingConfirmation { tx_hash: hash }.is_in_flight());
        assert!(TransactionState::StillPending { tx_hash: hash }.is_in_flight());
        assert!(!TransactionState::Confirmed { tx_hash: hash }.is_in_flight());
        assert!(!TransactionState::Failed {
            kind: FailureKind::UserRejected,
            tx_hash: None
        }
        .is_in_flight());
    }

    #[test]
    fn test_failure_kind_to_error() {
        assert_eq!(
            FailureKind::UserRejected.to_error(),
            ClientError::UserRejectedSignature
        );
        assert_eq!(
            FailureKind::ChainReverted {
                reason: Some("Auction not active".to_string())
            }
            .to_string(),
            "Transaction reverted: Auction not active"
        );
        assert_eq!(FailureKind::Network("timeout".into()).label(), "network");
    }
}

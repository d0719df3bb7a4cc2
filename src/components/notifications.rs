//! Notification bridge - controller transitions to user-facing messages
//!
//! Notifications are keyed by operation, so a `confirming` entry is replaced
//! by the success or error for the same operation. The current set lives in a
//! DashMap for instant lookup; every change is also broadcast to subscribers.
//!
//! Exactly one success notification is produced per confirmed transaction,
//! however many times the `Confirmed` transition is observed.

use crate::contract::OperationKind;
use crate::errors::ClientError;
use crate::format::explorer_tx_url;
use crate::tx::{TransactionState, TransitionEvent, TransitionObserver};
use crate::types::TxHash;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Loading,
    Success,
    Warning,
    Error,
}

/// One transient message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Operation identity, e.g. `"mint"` or `"batchStake"`
    pub key: String,
    pub level: NotificationLevel,
    pub message: String,
    pub tx_hash: Option<TxHash>,
    pub explorer_url: Option<String>,
}

/// Pure mapping from a transition to the notification it produces
pub fn notification_for(event: &TransitionEvent, chain_id: u64) -> Option<Notification> {
    let operation = event.operation;
    let (level, message) = match &event.to {
        TransactionState::Idle | TransactionState::Submitting => return None,
        TransactionState::AwaitingConfirmation { .. } => (
            NotificationLevel::Loading,
            operation.confirming_message().to_string(),
        ),
        TransactionState::Confirmed { .. } => (
            NotificationLevel::Success,
            operation.success_message().to_string(),
        ),
        TransactionState::Failed { kind, .. } => (NotificationLevel::Error, kind.to_string()),
        TransactionState::StillPending { .. } => (
            NotificationLevel::Warning,
            "Transaction still pending; check the explorer".to_string(),
        ),
    };

    let tx_hash = event.to.tx_hash();
    Some(Notification {
        key: operation.as_str().to_string(),
        level,
        message,
        tx_hash,
        explorer_url: tx_hash.and_then(|hash| explorer_tx_url(chain_id, &hash)),
    })
}

pub struct NotificationBridge {
    chain_id: u64,
    active: DashMap<String, Notification>,
    /// Hash of the latest success delivered per operation
    last_success: DashMap<OperationKind, TxHash>,
    tx: broadcast::Sender<Notification>,
}

impl NotificationBridge {
    pub fn new(chain_id: u64, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            chain_id,
            active: DashMap::new(),
            last_success: DashMap::new(),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn get(&self, key: &str) -> Option<Notification> {
        self.active.get(key).map(|n| n.value().clone())
    }

    /// Current notifications ordered by key
    pub fn active(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.active.iter().map(|n| n.value().clone()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    pub fn dismiss(&self, key: &str) -> bool {
        self.active.remove(key).is_some()
    }

    /// Surface an error that never reached the controller's state machine
    /// (not connected, validation, already in flight)
    pub fn report_local(&self, operation: OperationKind, error: &ClientError) {
        self.publish(Notification {
            key: operation.as_str().to_string(),
            level: NotificationLevel::Error,
            message: error.to_string(),
            tx_hash: None,
            explorer_url: None,
        });
    }

    fn publish(&self, notification: Notification) {
        debug!(
            key = %notification.key,
            level = ?notification.level,
            message = %notification.message,
            "notification"
        );
        self.active
            .insert(notification.key.clone(), notification.clone());
        // no subscribers is fine; the active map still holds it
        let _ = self.tx.send(notification);
    }
}

impl TransitionObserver for NotificationBridge {
    fn on_transition(&self, event: &TransitionEvent) {
        let key = event.operation.as_str();

        if event.to == TransactionState::Idle {
            // an abandoned wait leaves a stale spinner behind
            self.active
                .remove_if(key, |_, n| n.level == NotificationLevel::Loading);
            return;
        }

        let Some(notification) = notification_for(event, self.chain_id) else {
            return;
        };

        if let (NotificationLevel::Success, Some(hash)) = (notification.level, notification.tx_hash)
        {
            if self.last_success.insert(event.operation, hash) == Some(hash) {
                debug!(key, tx_hash = %hash, "duplicate success suppressed");
                return;
            }
        }

        self.publish(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::SubmissionId;
    use crate::tx::FailureKind;

    fn event(operation: OperationKind, from: TransactionState, to: TransactionState) -> TransitionEvent {
        TransitionEvent {
            operation,
            submission_id: SubmissionId::from("test"),
            from,
            to,
        }
    }

    fn hash() -> TxHash {
        TxHash::repeat_byte(7)
    }

    #[test]
    fn test_mapping() {
        let submitting = event(
            OperationKind::Mint,
            TransactionState::Idle,
            TransactionState::Submitting,
        );
        assert_eq!(notification_for(&submitting, 1), None);

        let waiting = event(
            OperationKind::Stake,
            TransactionState::Submitting,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
        );
        let n = notification_for(&waiting, 1).unwrap();
        assert_eq!(n.level, NotificationLevel::Loading);
        assert_eq!(n.message, "Confirming stake...");
        assert!(n.explorer_url.unwrap().starts_with("https://etherscan.io/tx/"));

        let failed = event(
            OperationKind::WhitelistMint,
            TransactionState::Submitting,
            TransactionState::Failed {
                kind: FailureKind::UserRejected,
                tx_hash: None,
            },
        );
        let n = notification_for(&failed, 31337).unwrap();
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.key, "wlMint");
        assert_eq!(n.explorer_url, None);
    }

    #[test]
    fn test_success_delivered_once() {
        let bridge = NotificationBridge::new(1, 16);
        let mut rx = bridge.subscribe();
        let confirmed = event(
            OperationKind::BatchMint,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
            TransactionState::Confirmed { tx_hash: hash() },
        );

        bridge.on_transition(&confirmed);
        bridge.on_transition(&confirmed);

        let n = rx.try_recv().unwrap();
        assert_eq!(n.message, "Batch mint successful!");
        assert!(rx.try_recv().is_err());
        assert_eq!(bridge.active().len(), 1);
    }

    #[test]
    fn test_success_tracking_stays_bounded() {
        let bridge = NotificationBridge::new(1, 256);
        let mut rx = bridge.subscribe();
        let confirm = |operation, n: u8| {
            let tx_hash = TxHash::repeat_byte(n);
            event(
                operation,
                TransactionState::AwaitingConfirmation { tx_hash },
                TransactionState::Confirmed { tx_hash },
            )
        };

        for n in 1..=100u8 {
            bridge.on_transition(&confirm(OperationKind::Stake, n));
        }
        bridge.on_transition(&confirm(OperationKind::Mint, 200));
        assert_eq!(bridge.last_success.len(), 2);

        // a repeat of the latest stake is still suppressed after another operation
        bridge.on_transition(&confirm(OperationKind::Stake, 100));
        let delivered = std::iter::from_fn(|| rx.try_recv().ok()).count();
        assert_eq!(delivered, 101);
    }

    #[test]
    fn test_confirming_replaced_by_result() {
        let bridge = NotificationBridge::new(1, 16);
        bridge.on_transition(&event(
            OperationKind::Unstake,
            TransactionState::Submitting,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
        ));
        assert_eq!(
            bridge.get("unstake").unwrap().level,
            NotificationLevel::Loading
        );

        bridge.on_transition(&event(
            OperationKind::Unstake,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
            TransactionState::Failed {
                kind: FailureKind::ChainReverted {
                    reason: Some("Token not staked".to_string()),
                },
                tx_hash: Some(hash()),
            },
        ));
        let n = bridge.get("unstake").unwrap();
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.message, "Transaction reverted: Token not staked");

        assert!(bridge.dismiss("unstake"));
        assert!(bridge.get("unstake").is_none());
    }

    #[test]
    fn test_idle_clears_spinner_but_keeps_success() {
        let bridge = NotificationBridge::new(1, 16);
        bridge.on_transition(&event(
            OperationKind::Mint,
            TransactionState::Submitting,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
        ));
        bridge.on_transition(&event(
            OperationKind::Mint,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
            TransactionState::Idle,
        ));
        assert!(bridge.get("mint").is_none());

        bridge.on_transition(&event(
            OperationKind::Reveal,
            TransactionState::AwaitingConfirmation { tx_hash: hash() },
            TransactionState::Confirmed { tx_hash: hash() },
        ));
        bridge.on_transition(&event(
            OperationKind::Reveal,
            TransactionState::Confirmed { tx_hash: hash() },
            TransactionState::Idle,
        ));
        assert_eq!(bridge.get("reveal").unwrap().message, "Collection revealed!");
    }

    #[test]
    fn test_report_local() {
        let bridge = NotificationBridge::new(1, 16);
        bridge.report_local(OperationKind::Mint, &ClientError::NotConnected);
        let n = bridge.get("mint").unwrap();
        assert_eq!(n.message, "Wallet not connected");
        assert_eq!(n.level, NotificationLevel::Error);
    }
}

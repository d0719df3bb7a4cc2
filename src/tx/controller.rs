//! Transaction lifecycle controller
//!
//! One controller owns one [`TransactionState`] and drives at most one
//! submission at a time:
//!
//! ```text
//! Idle|Failed|Confirmed --submit--> Submitting --signed--> AwaitingConfirmation
//!     AwaitingConfirmation --receipt ok-------> Confirmed --(auto reset)--> Idle
//!     AwaitingConfirmation --receipt reverted-> Failed(ChainReverted)
//!     AwaitingConfirmation --transport error--> Failed(Network)
//!     AwaitingConfirmation --deadline---------> StillPending
//!     Submitting --rejected---> Failed(UserRejected)
//! ```
//!
//! On confirmation the operation's namespaces are invalidated first, then
//! observers see the `Confirmed` transition, then the controller resets.
//! Nothing is invalidated before a receipt confirms.

use super::receipts::{ReceiptSource, ReceiptStatus};
use super::signer::{PreparedTransaction, SignerError, TransactionSigner};
use super::state::{FailureKind, TransactionState};
use crate::cache::ReadBindingCache;
use crate::config::Config;
use crate::contract::{OperationKind, TransactionRequest};
use crate::errors::{ClientError, ClientResult};
use crate::metrics::{metrics, Timer};
use crate::observability::SubmissionId;
use crate::types::{Address, TxHash};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// How long to wait for a receipt before reporting `StillPending`
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    /// Return to `Idle` right after `Confirmed`; otherwise wait for `acknowledge`
    pub auto_reset: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(180),
            receipt_poll_interval: Duration::from_secs(1),
            auto_reset: true,
        }
    }
}

impl From<&Config> for ControllerConfig {
    fn from(config: &Config) -> Self {
        Self {
            confirmation_timeout: config.confirmation_timeout(),
            receipt_poll_interval: config.receipt_poll_interval(),
            auto_reset: config.transactions.auto_reset,
        }
    }
}

/// One observed state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub operation: OperationKind,
    pub submission_id: SubmissionId,
    pub from: TransactionState,
    pub to: TransactionState,
}

/// Receives every transition of a controller, in order
///
/// Called synchronously outside the controller's locks; implementations
/// must not block.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);
}

/// Caller's view of one submission
#[derive(Debug)]
pub struct TxHandle {
    submission_id: SubmissionId,
    operation: OperationKind,
    outcome: watch::Receiver<Option<TransactionState>>,
}

impl TxHandle {
    pub fn submission_id(&self) -> &SubmissionId {
        &self.submission_id
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Settled state, if the submission has settled
    pub fn outcome(&self) -> Option<TransactionState> {
        self.outcome.borrow().clone()
    }

    /// Wait until the submission settles (`Confirmed`, `Failed` or `StillPending`)
    ///
    /// A `StillPending` outcome is replaced if `poll_pending` later resolves it;
    /// call `wait` again to observe that.
    pub async fn wait(&mut self) -> TransactionState {
        // a closed channel means the submission was released or replaced
        let _ = self.outcome.wait_for(|o| o.is_some()).await;
        let outcome = self.outcome.borrow().clone();
        outcome.unwrap_or(TransactionState::Failed {
            kind: FailureKind::Network("submission released before settlement".to_string()),
            tx_hash: None,
        })
    }

    /// Wait for an outcome other than `current`
    pub async fn wait_for_change(&mut self, current: &TransactionState) -> TransactionState {
        let _ = self
            .outcome
            .wait_for(|o| o.as_ref().is_some_and(|s| s != current))
            .await;
        let outcome = self.outcome.borrow().clone();
        outcome.unwrap_or_else(|| current.clone())
    }
}

struct Shared {
    state: TransactionState,
    /// Bumped per submission and on abandon; stale driver tasks compare it
    generation: u64,
    operation: Option<OperationKind>,
    submission_id: Option<SubmissionId>,
    request: Option<TransactionRequest>,
    outcome_tx: Option<watch::Sender<Option<TransactionState>>>,
    abandoned: HashMap<TxHash, OperationKind>,
}

struct ControllerInner {
    shared: Mutex<Shared>,
    signer: RwLock<Option<Arc<dyn TransactionSigner>>>,
    receipts: Arc<dyn ReceiptSource>,
    cache: ReadBindingCache,
    contract: Address,
    observers: RwLock<Vec<Arc<dyn TransitionObserver>>>,
    config: ControllerConfig,
}

/// State machine wrapping one mutating contract call at a time
#[derive(Clone)]
pub struct TransactionController {
    inner: Arc<ControllerInner>,
}

impl TransactionController {
    pub fn new(
        contract: Address,
        signer: Option<Arc<dyn TransactionSigner>>,
        receipts: Arc<dyn ReceiptSource>,
        cache: ReadBindingCache,
        config: ControllerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                shared: Mutex::new(Shared {
                    state: TransactionState::Idle,
                    generation: 0,
                    operation: None,
                    submission_id: None,
                    request: None,
                    outcome_tx: None,
                    abandoned: HashMap::new(),
                }),
                signer: RwLock::new(signer),
                receipts,
                cache,
                contract,
                observers: RwLock::new(Vec::new()),
                config,
            }),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn TransitionObserver>) {
        self.inner.observers.write().push(observer);
    }

    /// Connect or disconnect the signer; an in-flight submission keeps its own
    pub fn set_signer(&self, signer: Option<Arc<dyn TransactionSigner>>) {
        *self.inner.signer.write() = signer;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.signer.read().is_some()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.shared.lock().state.clone()
    }

    /// Request of the current or most recent submission
    pub fn current_request(&self) -> Option<TransactionRequest> {
        self.inner.shared.lock().request.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Submit a request
    ///
    /// Checked in order, each leaving the state untouched on failure:
    /// in-flight guard, connected signer, request validation. Must be called
    /// inside a tokio runtime; the lifecycle runs on a spawned task.
    pub fn submit(&self, request: TransactionRequest) -> ClientResult<TxHandle> {
        let operation = request.operation_kind();
        let mut shared = self.inner.shared.lock();

        if shared.state.is_in_flight() {
            metrics().tx_in_flight_rejections.inc();
            warn!(
                operation = %operation,
                state = %shared.state,
                "⏳ Submission refused: operation already in flight"
            );
            return Err(ClientError::OperationInFlight);
        }

        let signer = self
            .inner
            .signer
            .read()
            .clone()
            .ok_or(ClientError::NotConnected)?;

        request.validate()?;

        shared.generation += 1;
        let generation = shared.generation;
        let submission_id = SubmissionId::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let from = std::mem::replace(&mut shared.state, TransactionState::Submitting);
        shared.operation = Some(operation);
        shared.submission_id = Some(submission_id.clone());
        shared.request = Some(request.clone());
        shared.outcome_tx = Some(outcome_tx);
        drop(shared);

        metrics().tx_submitted.with_label_values(&[operation.as_str()]).inc();
        metrics().tx_in_flight.inc();
        self.notify(TransitionEvent {
            operation,
            submission_id: submission_id.clone(),
            from,
            to: TransactionState::Submitting,
        });

        let span = submission_id.span(operation.as_str());
        let controller = self.clone();
        tokio::spawn(
            async move { controller.drive(generation, signer, request).await }.instrument(span),
        );

        Ok(TxHandle {
            submission_id,
            operation,
            outcome: outcome_rx,
        })
    }

    /// Return from a settled state to `Idle`
    ///
    /// Needed after `Confirmed` when auto reset is off; also dismisses `Failed`.
    pub fn acknowledge(&self) -> bool {
        let shared = self.inner.shared.lock();
        if !matches!(
            shared.state,
            TransactionState::Confirmed { .. } | TransactionState::Failed { .. }
        ) {
            return false;
        }
        let generation = shared.generation;
        drop(shared);
        self.transition(generation, TransactionState::Idle).is_some()
    }

    /// Stop waiting on a broadcast transaction and release the controller
    ///
    /// The transaction itself cannot be recalled; its hash is returned and
    /// remembered so [`reconcile`](Self::reconcile) can settle it later.
    pub fn abandon(&self) -> Option<TxHash> {
        let mut shared = self.inner.shared.lock();
        let tx_hash = match shared.state {
            TransactionState::AwaitingConfirmation { tx_hash }
            | TransactionState::StillPending { tx_hash } => tx_hash,
            _ => return None,
        };
        let operation = shared.operation?;
        shared.abandoned.insert(tx_hash, operation);
        // invalidates the driver task and releases waiting handles
        shared.generation += 1;
        shared.outcome_tx = None;
        let generation = shared.generation;
        drop(shared);

        info!(operation = %operation, tx_hash = %tx_hash, "Abandoned wait for transaction");
        self.transition(generation, TransactionState::Idle);
        Some(tx_hash)
    }

    /// Abandoned transaction hashes not yet reconciled
    pub fn abandoned(&self) -> Vec<TxHash> {
        self.inner.shared.lock().abandoned.keys().copied().collect()
    }

    /// One more receipt lookup for a `StillPending` submission
    ///
    /// Resolves to `Confirmed` (with the usual invalidation and reset),
    /// `Failed(ChainReverted)`, or stays `StillPending`. A transport error is
    /// returned without changing state. In any other state the current state
    /// is returned unchanged. Overlapping calls settle the submission once;
    /// the later ones report the receipt without applying it again.
    pub async fn poll_pending(&self) -> ClientResult<TransactionState> {
        let (generation, tx_hash, operation) = {
            let shared = self.inner.shared.lock();
            match (&shared.state, shared.operation) {
                (TransactionState::StillPending { tx_hash }, Some(operation)) => {
                    (shared.generation, *tx_hash, operation)
                }
                (state, _) => return Ok(state.clone()),
            }
        };

        let settled = match self.inner.receipts.receipt_status(&tx_hash).await? {
            ReceiptStatus::Pending => return Ok(TransactionState::StillPending { tx_hash }),
            ReceiptStatus::Success { block_number } => {
                self.confirm(generation, operation, tx_hash, block_number)
                    .then_some(TransactionState::Confirmed { tx_hash })
            }
            ReceiptStatus::Reverted { reason } => {
                let kind = FailureKind::ChainReverted { reason };
                self.fail(generation, operation, kind.clone(), Some(tx_hash))
                    .then_some(TransactionState::Failed {
                        kind,
                        tx_hash: Some(tx_hash),
                    })
            }
        };
        Ok(settled.unwrap_or_else(|| self.state()))
    }

    /// Look up a transaction released with [`abandon`](Self::abandon)
    ///
    /// A confirmed receipt applies the operation's invalidation signal and
    /// forgets the hash; a reverted one just forgets it.
    pub async fn reconcile(&self, tx_hash: &TxHash) -> ClientResult<ReceiptStatus> {
        let status = self.inner.receipts.receipt_status(tx_hash).await?;
        if status == ReceiptStatus::Pending {
            return Ok(status);
        }

        let operation = self.inner.shared.lock().abandoned.remove(tx_hash);
        if let (Some(operation), ReceiptStatus::Success { .. }) = (operation, &status) {
            self.inner.cache.apply(&operation.invalidation_signal());
            info!(operation = %operation, tx_hash = %tx_hash, "Reconciled abandoned transaction");
        }
        Ok(status)
    }

    async fn drive(
        self,
        generation: u64,
        signer: Arc<dyn TransactionSigner>,
        request: TransactionRequest,
    ) {
        let operation = request.operation_kind();
        let prepared = PreparedTransaction {
            from: signer.address(),
            to: self.inner.contract,
            data: request.calldata(),
            value: request.attached_value(),
        };

        debug!(from = %prepared.from, value = %prepared.value, "awaiting signer decision");
        let tx_hash = match signer.sign_and_send(&prepared).await {
            Ok(hash) => hash,
            Err(SignerError::Rejected) => {
                self.fail(generation, operation, FailureKind::UserRejected, None);
                return;
            }
            Err(SignerError::Transport(msg)) => {
                self.fail(generation, operation, FailureKind::Network(msg), None);
                return;
            }
        };

        info!(tx_hash = %tx_hash, "📤 Transaction broadcast");
        if self
            .transition(generation, TransactionState::AwaitingConfirmation { tx_hash })
            .is_none()
        {
            return;
        }

        let timer = Timer::new();
        let poll_interval = self.inner.config.receipt_poll_interval;
        let deadline = tokio::time::Instant::now() + self.inner.config.confirmation_timeout;

        loop {
            if self.current_generation() != generation {
                debug!(tx_hash = %tx_hash, "driver released");
                return;
            }

            match self.inner.receipts.receipt_status(&tx_hash).await {
                Ok(ReceiptStatus::Pending) => {}
                Ok(ReceiptStatus::Success { block_number }) => {
                    timer.observe_duration(&metrics().confirmation_latency);
                    self.confirm(generation, operation, tx_hash, block_number);
                    return;
                }
                Ok(ReceiptStatus::Reverted { reason }) => {
                    self.fail(
                        generation,
                        operation,
                        FailureKind::ChainReverted { reason },
                        Some(tx_hash),
                    );
                    return;
                }
                Err(e) => {
                    self.fail(
                        generation,
                        operation,
                        FailureKind::Network(e.to_string()),
                        Some(tx_hash),
                    );
                    return;
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                metrics().tx_still_pending.inc();
                warn!(
                    tx_hash = %tx_hash,
                    timeout_secs = self.inner.config.confirmation_timeout.as_secs(),
                    "⌛ No receipt before deadline; transaction still pending"
                );
                self.transition(generation, TransactionState::StillPending { tx_hash });
                return;
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    fn current_generation(&self) -> u64 {
        self.inner.shared.lock().generation
    }

    /// Confirmed, then invalidate, then notify, then reset
    ///
    /// `false` when another path already settled this submission.
    fn confirm(
        &self,
        generation: u64,
        operation: OperationKind,
        tx_hash: TxHash,
        block_number: u64,
    ) -> bool {
        let confirmed = TransactionState::Confirmed { tx_hash };
        let Some(event) = self.set_state(generation, confirmed.clone()) else {
            return false;
        };

        let stale = self.inner.cache.apply(&operation.invalidation_signal());
        metrics().tx_confirmed.with_label_values(&[operation.as_str()]).inc();
        info!(
            tx_hash = %tx_hash,
            block_number,
            stale_bindings = stale,
            "✅ {}",
            operation.success_message()
        );

        self.notify(event);
        self.publish_outcome(generation, confirmed);

        if self.inner.config.auto_reset {
            self.transition(generation, TransactionState::Idle);
        }
        true
    }

    fn fail(
        &self,
        generation: u64,
        operation: OperationKind,
        kind: FailureKind,
        tx_hash: Option<TxHash>,
    ) -> bool {
        let failed = TransactionState::Failed {
            kind: kind.clone(),
            tx_hash,
        };
        if self.transition(generation, failed).is_none() {
            return false;
        }
        metrics()
            .tx_failed
            .with_label_values(&[operation.as_str(), kind.label()])
            .inc();
        warn!(operation = %operation, reason = %kind, "❌ Transaction failed");
        true
    }

    /// Set state and notify observers; `None` when `generation` is stale or
    /// the submission already settled
    fn transition(&self, generation: u64, to: TransactionState) -> Option<()> {
        let event = self.set_state(generation, to)?;
        let settled = event.to.is_settled().then(|| event.to.clone());
        self.notify(event);
        if let Some(state) = settled {
            self.publish_outcome(generation, state);
        }
        Some(())
    }

    fn set_state(&self, generation: u64, to: TransactionState) -> Option<TransitionEvent> {
        let mut shared = self.inner.shared.lock();
        if shared.generation != generation {
            return None;
        }
        // only an in-flight submission can settle, and only once
        if to.is_settled() && !shared.state.is_in_flight() {
            debug!(state = %shared.state, to = %to, "late settlement ignored");
            return None;
        }
        let operation = shared.operation?;
        let submission_id = shared.submission_id.clone()?;
        let from = std::mem::replace(&mut shared.state, to.clone());

        if from.is_in_flight() && !to.is_in_flight() {
            metrics().tx_in_flight.dec();
        }
        drop(shared);

        debug!(from = %from, to = %to, "transaction state transition");
        Some(TransitionEvent {
            operation,
            submission_id,
            from,
            to,
        })
    }

    /// Wake `TxHandle` waiters once observers have seen the settled state
    fn publish_outcome(&self, generation: u64, state: TransactionState) {
        let shared = self.inner.shared.lock();
        if shared.generation != generation {
            return;
        }
        if let Some(outcome_tx) = &shared.outcome_tx {
            outcome_tx.send_replace(Some(state));
        }
    }

    fn notify(&self, event: TransitionEvent) {
        let observers = self.inner.observers.read().clone();
        for observer in observers {
            observer.on_transition(&event);
        }
    }
}

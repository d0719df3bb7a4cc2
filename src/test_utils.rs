//! Test Utilities Module
//!
//! In-memory stand-ins for the signer, the receipt source, the auction feed
//! and the wall clock, plus an observer that records transitions. Nothing
//! here touches the network, so controller and auction tests are
//! deterministic under paused tokio time.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use crate::components::auction_sync::{AuctionFeed, Clock};
use crate::errors::{ClientError, ClientResult};
use crate::rpc::RpcError;
use crate::tx::{
    PreparedTransaction, ReceiptSource, ReceiptStatus, SignerError, TransactionSigner,
    TransitionEvent, TransitionObserver,
};
use crate::types::{Address, AuctionStatus, TxHash};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Scripted signer
///
/// Responses are consumed in order; with nothing scripted the signer reports
/// a transport error. `hold` keeps every signature request waiting until
/// `release`, which models a wallet prompt left open.
pub struct MockSigner {
    address: Address,
    responses: Mutex<VecDeque<Result<TxHash, SignerError>>>,
    sent: Mutex<Vec<PreparedTransaction>>,
    gate: watch::Sender<bool>,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            address,
            responses: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            gate,
        }
    }

    pub fn push_ok(&self, hash: TxHash) {
        self.responses.lock().push_back(Ok(hash));
    }

    pub fn push_rejected(&self) {
        self.responses.lock().push_back(Err(SignerError::Rejected));
    }

    pub fn push_transport_error(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(SignerError::Transport(message.to_string())));
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Transactions handed to the signer, in order
    pub fn sent(&self) -> Vec<PreparedTransaction> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_and_send(&self, tx: &PreparedTransaction) -> Result<TxHash, SignerError> {
        self.sent.lock().push(tx.clone());
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SignerError::Transport("no scripted response".to_string())))
    }
}

/// Scripted receipts per transaction hash; unscripted lookups are `Pending`
///
/// `set_latency` makes every lookup suspend for that long before answering,
/// so concurrent callers overlap the way they do against a real node.
#[derive(Default)]
pub struct MockReceiptSource {
    responses: Mutex<HashMap<TxHash, VecDeque<Result<ReceiptStatus, RpcError>>>>,
    lookups: AtomicUsize,
    latency: Mutex<Duration>,
}

impl MockReceiptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, hash: TxHash, response: Result<ReceiptStatus, RpcError>) {
        self.responses
            .lock()
            .entry(hash)
            .or_default()
            .push_back(response);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptSource for MockReceiptSource {
    async fn receipt_status(&self, tx_hash: &TxHash) -> Result<ReceiptStatus, RpcError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.responses
            .lock()
            .get_mut(tx_hash)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(ReceiptStatus::Pending))
    }
}

/// Records every transition it observes
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TransitionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().clone()
    }
}

impl TransitionObserver for RecordingObserver {
    fn on_transition(&self, event: &TransitionEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Auction feed with settable status and drop time
pub struct MockAuctionFeed {
    status: Mutex<AuctionStatus>,
    next_drop: AtomicU64,
    failing: AtomicBool,
    status_calls: AtomicUsize,
    drop_time_calls: AtomicUsize,
}

impl MockAuctionFeed {
    pub fn new(status: AuctionStatus, next_drop: u64) -> Self {
        Self {
            status: Mutex::new(status),
            next_drop: AtomicU64::new(next_drop),
            failing: AtomicBool::new(false),
            status_calls: AtomicUsize::new(0),
            drop_time_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: AuctionStatus) {
        *self.status.lock() = status;
    }

    pub fn set_next_drop(&self, epoch_seconds: u64) {
        self.next_drop.store(epoch_seconds, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn drop_time_calls(&self) -> usize {
        self.drop_time_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> ClientResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Network("mock feed unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuctionFeed for MockAuctionFeed {
    async fn auction_status(&self) -> ClientResult<AuctionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(*self.status.lock())
    }

    async fn next_price_drop_time(&self) -> ClientResult<u64> {
        self.drop_time_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.next_drop.load(Ordering::SeqCst))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(epoch_seconds: u64) -> Self {
        Self {
            now: AtomicU64::new(epoch_seconds),
        }
    }

    pub fn set(&self, epoch_seconds: u64) {
        self.now.store(epoch_seconds, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

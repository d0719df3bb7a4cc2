//! Transaction submission and settlement
//!
//! - **state**: `TransactionState` and failure kinds
//! - **signer**: the signing seam and the node-account signer
//! - **receipts**: the receipt seam with revert-reason replay
//! - **controller**: the lifecycle state machine

mod controller;
mod receipts;
mod signer;
mod state;

pub use controller::{
    ControllerConfig, TransactionController, TransitionEvent, TransitionObserver, TxHandle,
};
pub use receipts::{ReceiptSource, ReceiptStatus, RpcReceiptSource};
pub use signer::{PreparedTransaction, RpcSigner, SignerError, TransactionSigner};
pub use state::{FailureKind, TransactionState};

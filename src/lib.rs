//! NFT Drop Client Library
//!
//! Client-side logic for minting, staking and Dutch-auction bidding against
//! an on-chain NFT drop contract.
//!
//! ## Modules
//!
//! - **tx**: transaction lifecycle state machine (`TransactionController`)
//! - **cache**: namespaced read bindings refreshed after confirmations
//! - **quantity**: pure quantity bounds and exact batch cost
//! - **components**: auction price sync, notifications, token metadata
//! - **contract**: `sol!` bindings, typed reads and state-changing calls
//! - **rpc**: alloy HTTP provider with request deadlines

pub mod cache;
pub mod components;
pub mod config;
pub mod contract;
pub mod errors;
pub mod format;
pub mod metrics;
pub mod observability;
pub mod quantity;
pub mod rpc;
pub mod tx;
pub mod types;

pub mod test_utils;

// Re-export commonly used types
pub use cache::{InvalidationSignal, Namespace, ReadBindingCache};
pub use config::Config;
pub use contract::{ContractCall, ContractReader, OperationKind, TransactionRequest};
pub use errors::{ClientError, ClientResult};
pub use tx::{TransactionController, TransactionState};
pub use types::{Address, TokenId, TxHash, Wei, U256};

//! Drop contract bindings
//!
//! - **bindings**: the `sol!` interface, revert decoding, uint narrowing
//! - **calls**: write endpoints and the immutable `TransactionRequest`
//! - **reader**: typed read endpoints over `eth_call`

pub mod bindings;
mod calls;
mod reader;

pub use calls::{ContractCall, OperationKind, TransactionRequest};
pub use reader::ContractReader;

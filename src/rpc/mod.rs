//! Node access for the drop contract
//!
//! - **errors**: transport / response / decode taxonomy
//! - **node**: the alloy HTTP provider with per-request deadlines, and the
//!   `CallTransport` seam reads go through

mod errors;
mod node;

pub use errors::{RpcError, EXECUTION_REVERTED_CODE, USER_REJECTED_CODE};
pub use node::{CallTransport, HttpProvider, NodeClient, SentTransaction};

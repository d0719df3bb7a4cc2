//! Components built on top of the controller, cache and contract reader
//!
//! - **auction_sync**: Dutch auction price polling and local countdowns
//! - **notifications**: controller transitions to user-facing messages
//! - **metadata**: `ipfs://` resolution and token detail assembly

pub mod auction_sync;
pub mod metadata;
pub mod notifications;

pub use auction_sync::{
    AuctionFeed, AuctionPriceSync, AuctionSyncConfig, AuctionSyncHandle, AuctionView, Clock,
    Countdown, PriceTracker, SystemClock,
};
pub use metadata::{resolve_uri, MetadataClient};
pub use notifications::{Notification, NotificationBridge, NotificationLevel};

//! Common types used throughout the client

pub use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

/// Native-currency amount in the smallest unit (wei)
pub type Wei = U256;

/// NFT token identifier
pub type TokenId = u64;

/// Fixed maximum number of tokens a single mint call may request
pub const MAX_MINT_PER_TX: u32 = 10;

/// Fixed maximum number of token ids accepted by batch stake/unstake
pub const MAX_BATCH_STAKE: usize = 20;

/// Upper bound on the `ownerOf` scan used to enumerate owned tokens
pub const OWNED_TOKEN_SCAN_LIMIT: u64 = 300;

/// One ether in wei
pub const WEI_PER_ETHER: Wei = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Named rarity category with mint probability and capped supply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityTier {
    pub name: String,
    /// Mint probability in basis points (10000 = 100%)
    pub probability: u64,
    pub max_supply: u64,
    pub current_supply: u64,
    pub special_attribute: String,
}

/// Aggregate contract statistics as returned by `getContractStats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStats {
    pub total_supply: u64,
    pub remaining_supply: u64,
    pub total_rarity_tiers: u64,
    pub is_revealed: bool,
    pub is_staking_enabled: bool,
    pub is_whitelist_phase_active: bool,
    pub is_auction_active: bool,
}

/// Dutch auction status as returned by `getAuctionStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionStatus {
    pub is_active: bool,
    pub current_price: Wei,
    /// Seconds until the auction ends
    pub time_remaining: u64,
}

/// Per-address whitelist standing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WhitelistStatus {
    pub is_whitelisted: bool,
    pub remaining_mints: u64,
    pub phase_active: bool,
}

/// A single `{trait_type, value}` entry; values may be strings or numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

/// Off-chain token metadata document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub attributes: Vec<TokenAttribute>,
}

/// Everything the client knows about one token
#[derive(Debug, Clone, PartialEq)]
pub struct NftToken {
    pub token_id: TokenId,
    pub token_uri: Option<String>,
    pub rarity: Option<RarityTier>,
    pub is_staked: bool,
    /// Seconds the token has been staked, zero when unstaked
    pub staking_duration: u64,
    /// `None` when the metadata could not be fetched; render a placeholder
    pub metadata: Option<TokenMetadata>,
}

impl NftToken {
    /// Display name, falling back to `#<id>` when metadata is missing
    pub fn display_name(&self) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| format!("#{}", self.token_id))
    }

    pub fn has_placeholder(&self) -> bool {
        self.metadata.is_none()
    }
}

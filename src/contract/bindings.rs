//! Solidity interface of the drop contract
//!
//! Call encoding and return decoding come from the `sol!` expansion; the rest
//! of the crate works with the plain types in `crate::types`.

use crate::errors::{ClientError, ClientResult};
use crate::types::RarityTier;
use alloy::primitives::U256;
use alloy::sol_types::{Panic, Revert, SolError};

alloy::sol! {
    interface INftDrop {
        struct RarityTier {
            string name;
            uint256 probability;
            uint256 maxSupply;
            uint256 currentSupply;
            string specialAttribute;
        }

        function currentSupply() external view returns (uint256);
        function maxSupply() external view returns (uint256);
        function paused() external view returns (bool);
        function emergencyStop() external view returns (bool);
        function revealed() external view returns (bool);
        function stakingEnabled() external view returns (bool);
        function whitelistPhaseActive() external view returns (bool);
        function getContractStats() external view returns (
            uint256 totalSupply,
            uint256 remainingSupply,
            uint256 totalRarityTiers,
            bool isRevealed,
            bool isStakingEnabled,
            bool isWhitelistPhaseActive,
            bool isAuctionActive
        );
        function getRarityTierCount() external view returns (uint256);
        function getRarityTier(uint256 index) external view returns (RarityTier memory);
        function tokenURI(uint256 tokenId) external view returns (string memory);
        function getTokenRarity(uint256 tokenId) external view returns (RarityTier memory);
        function isTokenStaked(uint256 tokenId) external view returns (bool);
        function getStakingDuration(uint256 tokenId) external view returns (uint256);
        function ownerOf(uint256 tokenId) external view returns (address);
        function getUserStakedTokens(address user) external view returns (uint256[] memory);
        function getCurrentAuctionPrice() external view returns (uint256);
        function getAuctionStatus() external view returns (
            bool isActive,
            uint256 currentPrice,
            uint256 timeRemaining
        );
        function getNextPriceDropTime() external view returns (uint256);
        function isWhitelisted(address user) external view returns (bool);
        function getRemainingWhiteListMints(address user) external view returns (uint256);
        function owner() external view returns (address);
        function hasRole(bytes32 role, address account) external view returns (bool);

        function mint(address to) external;
        function batchMint(address to, uint256 quantity) external;
        function whitelistMint(uint256 quantity) external;
        function auctionMint(uint256 quantity) external payable;
        function stake(uint256 tokenId) external;
        function unstake(uint256 tokenId) external;
        function batchStake(uint256[] calldata tokenIds) external;
        function batchUnstake(uint256[] calldata tokenIds) external;
        function ownerMint(address to, uint256 tierIndex) external;
        function reveal() external;
        function setEmergencyStop(bool stopped) external;
        function withdraw() external;
        function pauseContract() external;
        function unpauseContract() external;
        function toggleStaking() external;
        function setWhitelistPhase(bool active) external;
        function startAuction(
            uint256 startPrice,
            uint256 endPrice,
            uint256 duration,
            uint256 priceDropInterval
        ) external;
        function endAuction() external;
    }
}

/// Narrow a uint256 count or timestamp; values past `u64` are a decode error
pub fn to_u64(value: U256, field: &str) -> ClientResult<u64> {
    u64::try_from(value)
        .map_err(|_| ClientError::decode(format!("{} exceeds u64: {}", field, value)))
}

impl TryFrom<INftDrop::RarityTier> for RarityTier {
    type Error = ClientError;

    fn try_from(tier: INftDrop::RarityTier) -> ClientResult<Self> {
        Ok(Self {
            probability: to_u64(tier.probability, "probability")?,
            max_supply: to_u64(tier.maxSupply, "maxSupply")?,
            current_supply: to_u64(tier.currentSupply, "currentSupply")?,
            name: tier.name,
            special_attribute: tier.specialAttribute,
        })
    }
}

/// Human-readable revert reason from revert data, when one is encoded
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }
    Panic::abi_decode(data, true)
        .ok()
        .map(|panic| format!("Panic code {}", panic.code))
}

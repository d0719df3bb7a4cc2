//! Typed read endpoints of the drop contract over `eth_call`

use super::bindings::{to_u64, INftDrop};
use crate::errors::{ClientError, ClientResult};
use crate::rpc::CallTransport;
use crate::types::{
    Address, AuctionStatus, ContractStats, RarityTier, TokenId, WhitelistStatus, Wei,
    OWNED_TOKEN_SCAN_LIMIT,
};
use alloy::primitives::{Bytes, B256, U256};
use alloy::sol_types::SolCall;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Read-only view of the contract; cheap to clone
#[derive(Clone)]
pub struct ContractReader {
    node: Arc<dyn CallTransport>,
    address: Address,
    scan_limit: u64,
}

impl ContractReader {
    pub fn new(node: Arc<dyn CallTransport>, address: Address) -> Self {
        Self {
            node,
            address,
            scan_limit: OWNED_TOKEN_SCAN_LIMIT,
        }
    }

    pub fn with_scan_limit(mut self, scan_limit: u64) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Encode `call`, run it against the latest block and decode its returns
    pub async fn read<C: SolCall>(&self, call: C) -> ClientResult<C::Return> {
        let input = Bytes::from(call.abi_encode());
        let raw = self.node.call(self.address, input).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| {
            ClientError::decode(format!("{} returned malformed data: {}", C::SIGNATURE, e))
        })
    }

    pub async fn current_supply(&self) -> ClientResult<u64> {
        let ret = self.read(INftDrop::currentSupplyCall {}).await?;
        to_u64(ret._0, "currentSupply")
    }

    pub async fn max_supply(&self) -> ClientResult<u64> {
        let ret = self.read(INftDrop::maxSupplyCall {}).await?;
        to_u64(ret._0, "maxSupply")
    }

    pub async fn paused(&self) -> ClientResult<bool> {
        Ok(self.read(INftDrop::pausedCall {}).await?._0)
    }

    pub async fn emergency_stop(&self) -> ClientResult<bool> {
        Ok(self.read(INftDrop::emergencyStopCall {}).await?._0)
    }

    pub async fn revealed(&self) -> ClientResult<bool> {
        Ok(self.read(INftDrop::revealedCall {}).await?._0)
    }

    pub async fn staking_enabled(&self) -> ClientResult<bool> {
        Ok(self.read(INftDrop::stakingEnabledCall {}).await?._0)
    }

    pub async fn whitelist_phase_active(&self) -> ClientResult<bool> {
        Ok(self.read(INftDrop::whitelistPhaseActiveCall {}).await?._0)
    }

    pub async fn contract_stats(&self) -> ClientResult<ContractStats> {
        let ret = self.read(INftDrop::getContractStatsCall {}).await?;
        Ok(ContractStats {
            total_supply: to_u64(ret.totalSupply, "totalSupply")?,
            remaining_supply: to_u64(ret.remainingSupply, "remainingSupply")?,
            total_rarity_tiers: to_u64(ret.totalRarityTiers, "totalRarityTiers")?,
            is_revealed: ret.isRevealed,
            is_staking_enabled: ret.isStakingEnabled,
            is_whitelist_phase_active: ret.isWhitelistPhaseActive,
            is_auction_active: ret.isAuctionActive,
        })
    }

    pub async fn rarity_tier_count(&self) -> ClientResult<u64> {
        let ret = self.read(INftDrop::getRarityTierCountCall {}).await?;
        to_u64(ret._0, "rarityTierCount")
    }

    pub async fn rarity_tier(&self, index: u64) -> ClientResult<RarityTier> {
        let ret = self
            .read(INftDrop::getRarityTierCall {
                index: U256::from(index),
            })
            .await?;
        RarityTier::try_from(ret._0)
    }

    /// Every tier, fetched concurrently in index order
    pub async fn rarity_tiers(&self) -> ClientResult<Vec<RarityTier>> {
        let count = self.rarity_tier_count().await?;
        join_all((0..count).map(|i| self.rarity_tier(i)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn token_uri(&self, token_id: TokenId) -> ClientResult<String> {
        let ret = self
            .read(INftDrop::tokenURICall {
                tokenId: U256::from(token_id),
            })
            .await?;
        Ok(ret._0)
    }

    pub async fn token_rarity(&self, token_id: TokenId) -> ClientResult<RarityTier> {
        let ret = self
            .read(INftDrop::getTokenRarityCall {
                tokenId: U256::from(token_id),
            })
            .await?;
        RarityTier::try_from(ret._0)
    }

    pub async fn is_token_staked(&self, token_id: TokenId) -> ClientResult<bool> {
        let ret = self
            .read(INftDrop::isTokenStakedCall {
                tokenId: U256::from(token_id),
            })
            .await?;
        Ok(ret._0)
    }

    pub async fn staking_duration(&self, token_id: TokenId) -> ClientResult<u64> {
        let ret = self
            .read(INftDrop::getStakingDurationCall {
                tokenId: U256::from(token_id),
            })
            .await?;
        to_u64(ret._0, "stakingDuration")
    }

    pub async fn owner_of(&self, token_id: TokenId) -> ClientResult<Address> {
        let ret = self
            .read(INftDrop::ownerOfCall {
                tokenId: U256::from(token_id),
            })
            .await?;
        Ok(ret._0)
    }

    /// Token ids owned by `owner`, found by asking `ownerOf` for every id in
    /// `1..=min(currentSupply, scan_limit)`
    ///
    /// Ids whose lookup fails (burned or unminted) are skipped.
    pub async fn owned_tokens(&self, owner: Address) -> ClientResult<Vec<TokenId>> {
        let supply = self.current_supply().await?;
        let upper = supply.min(self.scan_limit);
        if upper == 0 {
            return Ok(Vec::new());
        }

        let results = join_all((1..=upper).map(|id| async move { (id, self.owner_of(id).await) })).await;
        let owned: Vec<TokenId> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(holder) if holder == owner => Some(id),
                _ => None,
            })
            .collect();

        debug!(owner = %owner, scanned = upper, owned = owned.len(), "owned token scan");
        Ok(owned)
    }

    pub async fn user_staked_tokens(&self, user: Address) -> ClientResult<Vec<TokenId>> {
        let ret = self
            .read(INftDrop::getUserStakedTokensCall { user })
            .await?;
        ret._0
            .into_iter()
            .map(|id| to_u64(id, "tokenId"))
            .collect()
    }

    pub async fn current_auction_price(&self) -> ClientResult<Wei> {
        Ok(self.read(INftDrop::getCurrentAuctionPriceCall {}).await?._0)
    }

    pub async fn auction_status(&self) -> ClientResult<AuctionStatus> {
        let ret = self.read(INftDrop::getAuctionStatusCall {}).await?;
        Ok(AuctionStatus {
            is_active: ret.isActive,
            current_price: ret.currentPrice,
            time_remaining: to_u64(ret.timeRemaining, "timeRemaining")?,
        })
    }

    /// Epoch seconds of the next price drop
    pub async fn next_price_drop_time(&self) -> ClientResult<u64> {
        let ret = self.read(INftDrop::getNextPriceDropTimeCall {}).await?;
        to_u64(ret._0, "nextPriceDropTime")
    }

    pub async fn is_whitelisted(&self, user: Address) -> ClientResult<bool> {
        Ok(self.read(INftDrop::isWhitelistedCall { user }).await?._0)
    }

    pub async fn remaining_whitelist_mints(&self, user: Address) -> ClientResult<u64> {
        let ret = self
            .read(INftDrop::getRemainingWhiteListMintsCall { user })
            .await?;
        to_u64(ret._0, "remainingWhiteListMints")
    }

    pub async fn whitelist_status(&self, user: Address) -> ClientResult<WhitelistStatus> {
        let (is_whitelisted, remaining_mints, phase_active) = futures::try_join!(
            self.is_whitelisted(user),
            self.remaining_whitelist_mints(user),
            self.whitelist_phase_active(),
        )?;
        Ok(WhitelistStatus {
            is_whitelisted,
            remaining_mints,
            phase_active,
        })
    }

    pub async fn owner(&self) -> ClientResult<Address> {
        Ok(self.read(INftDrop::ownerCall {}).await?._0)
    }

    /// Addresses are compared as bytes, so checksum casing never matters
    pub async fn is_owner(&self, user: Address) -> ClientResult<bool> {
        Ok(self.owner().await? == user)
    }

    pub async fn has_role(&self, role: B256, user: Address) -> ClientResult<bool> {
        let ret = self
            .read(INftDrop::hasRoleCall {
                role,
                account: user,
            })
            .await?;
        Ok(ret._0)
    }
}

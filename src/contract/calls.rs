//! Write endpoints of the drop contract and the immutable request wrapper

use super::bindings::INftDrop;
use crate::cache::{InvalidationSignal, Namespace};
use crate::errors::ClientError;
use crate::quantity::{self, QuantityBound};
use crate::types::{Address, TokenId, Wei, MAX_BATCH_STAKE, MAX_MINT_PER_TX};
use alloy::primitives::{Bytes, U256};
use alloy::sol_types::SolCall;
use std::collections::HashSet;
use std::fmt;

/// Logical operation identity, also used to key notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Mint,
    BatchMint,
    WhitelistMint,
    AuctionMint,
    Stake,
    Unstake,
    BatchStake,
    BatchUnstake,
    OwnerMint,
    Reveal,
    SetEmergencyStop,
    Withdraw,
    Pause,
    Unpause,
    ToggleStaking,
    SetWhitelistPhase,
    StartAuction,
    EndAuction,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::BatchMint => "batchMint",
            Self::WhitelistMint => "wlMint",
            Self::AuctionMint => "auctionMint",
            Self::Stake => "stake",
            Self::Unstake => "unstake",
            Self::BatchStake => "batchStake",
            Self::BatchUnstake => "batchUnstake",
            Self::OwnerMint => "ownerMint",
            Self::Reveal => "reveal",
            Self::SetEmergencyStop => "setEmergencyStop",
            Self::Withdraw => "withdraw",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::ToggleStaking => "toggleStaking",
            Self::SetWhitelistPhase => "setWhitelistPhase",
            Self::StartAuction => "startAuction",
            Self::EndAuction => "endAuction",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Mint => "Mint successful!",
            Self::BatchMint => "Batch mint successful!",
            Self::WhitelistMint => "Whitelist mint successful!",
            Self::AuctionMint => "Auction mint successful!",
            Self::Stake => "Staked!",
            Self::Unstake => "Unstaked!",
            Self::BatchStake => "Batch staked!",
            Self::BatchUnstake => "Batch unstaked!",
            Self::OwnerMint => "Owner mint done",
            Self::Reveal => "Collection revealed!",
            Self::SetEmergencyStop => "Emergency stop updated",
            Self::Withdraw => "Withdrawn",
            Self::Pause | Self::Unpause => "Pause state updated",
            Self::ToggleStaking => "Staking toggled",
            Self::SetWhitelistPhase => "Whitelist phase updated",
            Self::StartAuction => "Auction started",
            Self::EndAuction => "Auction ended",
        }
    }

    pub fn confirming_message(&self) -> &'static str {
        match self {
            Self::Mint | Self::BatchMint | Self::WhitelistMint | Self::AuctionMint => {
                "Confirming mint..."
            }
            Self::Stake => "Confirming stake...",
            Self::Unstake => "Confirming unstake...",
            _ => "Confirming...",
        }
    }

    /// Namespaces whose bindings go stale once this operation confirms
    pub fn invalidation_signal(&self) -> InvalidationSignal {
        let extra = match self {
            Self::Mint | Self::BatchMint | Self::OwnerMint | Self::Reveal => None,
            Self::WhitelistMint | Self::SetWhitelistPhase => Some(Namespace::whitelist()),
            Self::AuctionMint | Self::StartAuction | Self::EndAuction => Some(Namespace::auction()),
            Self::Stake
            | Self::Unstake
            | Self::BatchStake
            | Self::BatchUnstake
            | Self::ToggleStaking => Some(Namespace::staking()),
            Self::SetEmergencyStop | Self::Withdraw | Self::Pause | Self::Unpause => {
                Some(Namespace::admin())
            }
        };
        InvalidationSignal::new(std::iter::once(Namespace::contract()).chain(extra))
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::OwnerMint
                | Self::Reveal
                | Self::SetEmergencyStop
                | Self::Withdraw
                | Self::Pause
                | Self::Unpause
                | Self::ToggleStaking
                | Self::SetWhitelistPhase
                | Self::StartAuction
                | Self::EndAuction
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state-changing contract call with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Mint { to: Address },
    BatchMint { to: Address, quantity: u32 },
    WhitelistMint { quantity: u32 },
    AuctionMint { quantity: u32 },
    Stake { token_id: TokenId },
    Unstake { token_id: TokenId },
    BatchStake { token_ids: Vec<TokenId> },
    BatchUnstake { token_ids: Vec<TokenId> },
    OwnerMint { to: Address, tier_index: u32 },
    Reveal,
    SetEmergencyStop { stopped: bool },
    Withdraw,
    Pause,
    Unpause,
    ToggleStaking,
    SetWhitelistPhase { active: bool },
    StartAuction {
        start_price: Wei,
        end_price: Wei,
        duration_secs: u64,
        price_drop_interval_secs: u64,
    },
    EndAuction,
}

fn token_ids(ids: &[TokenId]) -> Vec<U256> {
    ids.iter().map(|id| U256::from(*id)).collect()
}

impl ContractCall {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Mint { .. } => OperationKind::Mint,
            Self::BatchMint { .. } => OperationKind::BatchMint,
            Self::WhitelistMint { .. } => OperationKind::WhitelistMint,
            Self::AuctionMint { .. } => OperationKind::AuctionMint,
            Self::Stake { .. } => OperationKind::Stake,
            Self::Unstake { .. } => OperationKind::Unstake,
            Self::BatchStake { .. } => OperationKind::BatchStake,
            Self::BatchUnstake { .. } => OperationKind::BatchUnstake,
            Self::OwnerMint { .. } => OperationKind::OwnerMint,
            Self::Reveal => OperationKind::Reveal,
            Self::SetEmergencyStop { .. } => OperationKind::SetEmergencyStop,
            Self::Withdraw => OperationKind::Withdraw,
            Self::Pause => OperationKind::Pause,
            Self::Unpause => OperationKind::Unpause,
            Self::ToggleStaking => OperationKind::ToggleStaking,
            Self::SetWhitelistPhase { .. } => OperationKind::SetWhitelistPhase,
            Self::StartAuction { .. } => OperationKind::StartAuction,
            Self::EndAuction => OperationKind::EndAuction,
        }
    }

    /// ABI-encoded call: selector followed by the arguments
    pub fn calldata(&self) -> Bytes {
        let data = match self {
            Self::Mint { to } => INftDrop::mintCall { to: *to }.abi_encode(),
            Self::BatchMint { to, quantity } => INftDrop::batchMintCall {
                to: *to,
                quantity: U256::from(*quantity),
            }
            .abi_encode(),
            Self::WhitelistMint { quantity } => INftDrop::whitelistMintCall {
                quantity: U256::from(*quantity),
            }
            .abi_encode(),
            Self::AuctionMint { quantity } => INftDrop::auctionMintCall {
                quantity: U256::from(*quantity),
            }
            .abi_encode(),
            Self::Stake { token_id } => INftDrop::stakeCall {
                tokenId: U256::from(*token_id),
            }
            .abi_encode(),
            Self::Unstake { token_id } => INftDrop::unstakeCall {
                tokenId: U256::from(*token_id),
            }
            .abi_encode(),
            Self::BatchStake { token_ids: ids } => INftDrop::batchStakeCall {
                tokenIds: token_ids(ids),
            }
            .abi_encode(),
            Self::BatchUnstake { token_ids: ids } => INftDrop::batchUnstakeCall {
                tokenIds: token_ids(ids),
            }
            .abi_encode(),
            Self::OwnerMint { to, tier_index } => INftDrop::ownerMintCall {
                to: *to,
                tierIndex: U256::from(*tier_index),
            }
            .abi_encode(),
            Self::Reveal => INftDrop::revealCall {}.abi_encode(),
            Self::SetEmergencyStop { stopped } => {
                INftDrop::setEmergencyStopCall { stopped: *stopped }.abi_encode()
            }
            Self::Withdraw => INftDrop::withdrawCall {}.abi_encode(),
            Self::Pause => INftDrop::pauseContractCall {}.abi_encode(),
            Self::Unpause => INftDrop::unpauseContractCall {}.abi_encode(),
            Self::ToggleStaking => INftDrop::toggleStakingCall {}.abi_encode(),
            Self::SetWhitelistPhase { active } => {
                INftDrop::setWhitelistPhaseCall { active: *active }.abi_encode()
            }
            Self::StartAuction {
                start_price,
                end_price,
                duration_secs,
                price_drop_interval_secs,
            } => INftDrop::startAuctionCall {
                startPrice: *start_price,
                endPrice: *end_price,
                duration: U256::from(*duration_secs),
                priceDropInterval: U256::from(*price_drop_interval_secs),
            }
            .abi_encode(),
            Self::EndAuction => INftDrop::endAuctionCall {}.abi_encode(),
        };
        Bytes::from(data)
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, Self::AuctionMint { .. })
    }

    fn quantity(&self) -> Option<u32> {
        match self {
            Self::BatchMint { quantity, .. }
            | Self::WhitelistMint { quantity }
            | Self::AuctionMint { quantity } => Some(*quantity),
            _ => None,
        }
    }

    /// Argument checks that need no chain state
    fn validate_args(&self) -> Result<(), ClientError> {
        if let Some(quantity) = self.quantity() {
            quantity::validate(quantity, &QuantityBound::unbounded(MAX_MINT_PER_TX))?;
        }

        match self {
            Self::Mint { to } | Self::BatchMint { to, .. } | Self::OwnerMint { to, .. }
                if to.is_zero() =>
            {
                Err(ClientError::validation("Recipient cannot be the zero address"))
            }
            Self::BatchStake { token_ids } | Self::BatchUnstake { token_ids } => {
                if token_ids.is_empty() || token_ids.len() > MAX_BATCH_STAKE {
                    return Err(ClientError::validation(format!(
                        "Select 1-{} tokens",
                        MAX_BATCH_STAKE
                    )));
                }
                let unique: HashSet<_> = token_ids.iter().collect();
                if unique.len() != token_ids.len() {
                    return Err(ClientError::validation("Duplicate token ids in batch"));
                }
                Ok(())
            }
            Self::StartAuction {
                start_price,
                end_price,
                duration_secs,
                price_drop_interval_secs,
            } => {
                if start_price.is_zero() {
                    return Err(ClientError::validation("Start price must be positive"));
                }
                if end_price > start_price {
                    return Err(ClientError::validation(
                        "End price cannot exceed start price",
                    ));
                }
                if *duration_secs == 0 || *price_drop_interval_secs == 0 {
                    return Err(ClientError::validation(
                        "Duration and price drop interval must be positive",
                    ));
                }
                if price_drop_interval_secs > duration_secs {
                    return Err(ClientError::validation(
                        "Price drop interval cannot exceed auction duration",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A submitted operation: call, attached value and optional dynamic bound
///
/// Fields are private so a request cannot change once handed to a
/// controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    call: ContractCall,
    attached_value: Wei,
    bound: Option<QuantityBound>,
}

impl TransactionRequest {
    pub fn new(call: ContractCall) -> Self {
        Self {
            call,
            attached_value: Wei::ZERO,
            bound: None,
        }
    }

    pub fn with_value(call: ContractCall, attached_value: Wei) -> Self {
        Self {
            call,
            attached_value,
            bound: None,
        }
    }

    /// Auction mint paying exactly `unit_price * quantity`
    pub fn auction_mint(quantity: u32, unit_price: Wei) -> Result<Self, ClientError> {
        let value = quantity::total_cost(unit_price, quantity)
            .ok_or_else(|| ClientError::validation("Total cost overflows"))?;
        Ok(Self::with_value(ContractCall::AuctionMint { quantity }, value))
    }

    /// Also check the quantity against a dynamic bound at validation time
    pub fn with_bound(mut self, bound: QuantityBound) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn call(&self) -> &ContractCall {
        &self.call
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.call.kind()
    }

    pub fn attached_value(&self) -> Wei {
        self.attached_value
    }

    pub fn calldata(&self) -> Bytes {
        self.call.calldata()
    }

    /// Local validation; failures never reach the network
    pub fn validate(&self) -> Result<(), ClientError> {
        self.call.validate_args()?;

        if let (Some(bound), Some(quantity)) = (&self.bound, self.call.quantity()) {
            quantity::validate(quantity, bound)?;
        }

        if self.call.is_payable() {
            if self.attached_value.is_zero() {
                return Err(ClientError::validation("Auction mint requires payment"));
            }
        } else if !self.attached_value.is_zero() {
            return Err(ClientError::validation(format!(
                "{} does not accept value",
                self.call.kind()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap()
    }

    fn wei(n: u64) -> Wei {
        Wei::from(n)
    }

    #[test]
    fn test_calldata_carries_arguments() {
        let call = ContractCall::BatchMint {
            to: alice(),
            quantity: 3,
        };
        let data = call.calldata();
        assert_eq!(data[..4], INftDrop::batchMintCall::SELECTOR);
        assert_eq!(data.len(), 4 + 64);

        let decoded = INftDrop::batchMintCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.to, alice());
        assert_eq!(decoded.quantity, U256::from(3u64));
    }

    #[test]
    fn test_batch_stake_encodes_id_array() {
        let data = ContractCall::BatchStake {
            token_ids: vec![7, 9],
        }
        .calldata();
        let decoded = INftDrop::batchStakeCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.tokenIds, vec![U256::from(7u64), U256::from(9u64)]);
    }

    #[test]
    fn test_no_arg_calls() {
        assert_eq!(
            ContractCall::Reveal.calldata().as_ref(),
            INftDrop::revealCall::SELECTOR.as_slice()
        );
        assert_eq!(
            ContractCall::Pause.calldata().as_ref(),
            INftDrop::pauseContractCall::SELECTOR.as_slice()
        );
    }

    #[test]
    fn test_auction_mint_cost() {
        let req = TransactionRequest::auction_mint(3, wei(50_000_000_000_000_000)).unwrap();
        assert_eq!(req.attached_value(), wei(150_000_000_000_000_000));
        assert_eq!(req.operation_kind(), OperationKind::AuctionMint);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_quantity_limits() {
        let too_many = TransactionRequest::new(ContractCall::WhitelistMint { quantity: 11 });
        assert!(matches!(too_many.validate(), Err(ClientError::Validation(_))));

        let zero = TransactionRequest::new(ContractCall::BatchMint {
            to: alice(),
            quantity: 0,
        });
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_dynamic_bound_is_enforced() {
        let req = TransactionRequest::new(ContractCall::WhitelistMint { quantity: 3 })
            .with_bound(QuantityBound::for_whitelist(2));
        let err = req.validate().unwrap_err();
        assert_eq!(err, ClientError::Validation("Quantity must be 1-2".to_string()));

        let exhausted = TransactionRequest::new(ContractCall::WhitelistMint { quantity: 1 })
            .with_bound(QuantityBound::for_whitelist(0));
        assert!(exhausted.validate().is_err());
    }

    #[test]
    fn test_value_rules() {
        let unpaid = TransactionRequest::new(ContractCall::AuctionMint { quantity: 1 });
        assert!(unpaid.validate().is_err());

        let paid_stake =
            TransactionRequest::with_value(ContractCall::Stake { token_id: 1 }, wei(1));
        assert!(paid_stake.validate().is_err());
    }

    #[test]
    fn test_batch_stake_limits() {
        let empty = TransactionRequest::new(ContractCall::BatchStake { token_ids: vec![] });
        assert_eq!(
            empty.validate().unwrap_err(),
            ClientError::Validation("Select 1-20 tokens".to_string())
        );

        let too_many = TransactionRequest::new(ContractCall::BatchUnstake {
            token_ids: (1..=21).collect(),
        });
        assert!(too_many.validate().is_err());

        let dupes = TransactionRequest::new(ContractCall::BatchStake {
            token_ids: vec![4, 4],
        });
        assert!(dupes.validate().is_err());

        let ok = TransactionRequest::new(ContractCall::BatchStake {
            token_ids: (1..=20).collect(),
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_start_auction_validation() {
        let call = |start, end, duration, interval| {
            TransactionRequest::new(ContractCall::StartAuction {
                start_price: wei(start),
                end_price: wei(end),
                duration_secs: duration,
                price_drop_interval_secs: interval,
            })
        };
        assert!(call(100, 10, 3600, 300).validate().is_ok());
        assert!(call(0, 0, 3600, 300).validate().is_err());
        assert!(call(10, 100, 3600, 300).validate().is_err());
        assert!(call(100, 10, 0, 300).validate().is_err());
        assert!(call(100, 10, 300, 3600).validate().is_err());
    }

    #[test]
    fn test_zero_recipient_rejected() {
        let req = TransactionRequest::new(ContractCall::Mint { to: Address::ZERO });
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_invalidation_signals() {
        let signal = OperationKind::WhitelistMint.invalidation_signal();
        assert!(signal.contains(&Namespace::contract()));
        assert!(signal.contains(&Namespace::whitelist()));

        let signal = OperationKind::Mint.invalidation_signal();
        assert_eq!(signal.len(), 1);

        assert!(OperationKind::BatchStake
            .invalidation_signal()
            .contains(&Namespace::staking()));
    }

    #[test]
    fn test_messages() {
        assert_eq!(OperationKind::Stake.success_message(), "Staked!");
        assert_eq!(OperationKind::AuctionMint.confirming_message(), "Confirming mint...");
        assert!(OperationKind::Reveal.is_admin());
        assert!(!OperationKind::Mint.is_admin());
    }
}

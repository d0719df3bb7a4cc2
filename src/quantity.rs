//! Quantity validation for batch operations
//!
//! Every bound is a pure function of explicit inputs. Callers recompute on
//! each change to the requested quantity or to anything feeding the bound
//! (remaining supply, whitelist allotment after a confirmed mint, ...).

use crate::errors::ClientError;
use crate::types::{Wei, MAX_MINT_PER_TX};
use std::fmt;

/// Where the dynamic part of a bound comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicAllowance {
    /// Tokens left before `maxSupply`
    SupplyRemaining(u64),
    /// Whitelist allotment left for the connected address
    WhitelistRemaining(u64),
    /// No cap beyond the per-transaction cap
    Unspecified,
}

impl DynamicAllowance {
    pub fn limit(&self) -> Option<u64> {
        match self {
            Self::SupplyRemaining(n) | Self::WhitelistRemaining(n) => Some(*n),
            Self::Unspecified => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityBound {
    pub min: u32,
    pub per_tx_cap: u32,
    pub dynamic_allowance: DynamicAllowance,
}

impl QuantityBound {
    /// Public/auction mint: `1..=MAX_MINT_PER_TX`, capped by remaining supply
    pub fn for_supply(remaining_supply: u64) -> Self {
        Self {
            min: 1,
            per_tx_cap: MAX_MINT_PER_TX,
            dynamic_allowance: DynamicAllowance::SupplyRemaining(remaining_supply),
        }
    }

    /// Whitelist mint: `1..=MAX_MINT_PER_TX`, capped by the address allotment
    pub fn for_whitelist(remaining_mints: u64) -> Self {
        Self {
            min: 1,
            per_tx_cap: MAX_MINT_PER_TX,
            dynamic_allowance: DynamicAllowance::WhitelistRemaining(remaining_mints),
        }
    }

    pub fn unbounded(per_tx_cap: u32) -> Self {
        Self {
            min: 1,
            per_tx_cap,
            dynamic_allowance: DynamicAllowance::Unspecified,
        }
    }

    /// `min(per_tx_cap, allowance)`, or `None` when that falls below `min`
    pub fn effective_max(&self) -> Option<u32> {
        let cap = match self.dynamic_allowance.limit() {
            Some(limit) => u64::from(self.per_tx_cap).min(limit) as u32,
            None => self.per_tx_cap,
        };
        (cap >= self.min).then_some(cap)
    }

    pub fn is_available(&self) -> bool {
        self.effective_max().is_some()
    }
}

/// Reported when the bound leaves no valid quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityUnavailable {
    pub bound: QuantityBound,
}

impl fmt::Display for QuantityUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound.dynamic_allowance {
            DynamicAllowance::SupplyRemaining(0) => write!(f, "Max supply reached"),
            DynamicAllowance::WhitelistRemaining(0) => write!(f, "No whitelist mints remaining"),
            _ => write!(
                f,
                "No quantity satisfies min {} within cap {}",
                self.bound.min, self.bound.per_tx_cap
            ),
        }
    }
}

impl From<QuantityUnavailable> for ClientError {
    fn from(err: QuantityUnavailable) -> Self {
        ClientError::Validation(err.to_string())
    }
}

/// Clamp a requested quantity into `[min, effective_max]`
///
/// Returns [`QuantityUnavailable`] rather than an out-of-range value when the
/// allowance is exhausted; the caller disables the action.
pub fn clamp(requested: u32, bound: &QuantityBound) -> Result<u32, QuantityUnavailable> {
    let max = bound
        .effective_max()
        .ok_or(QuantityUnavailable { bound: *bound })?;
    Ok(requested.min(max).max(bound.min))
}

/// Strict check used at submission time: the quantity must already be in range
pub fn validate(quantity: u32, bound: &QuantityBound) -> Result<u32, ClientError> {
    let max = bound.effective_max().ok_or(QuantityUnavailable { bound: *bound })?;
    if quantity < bound.min || quantity > max {
        return Err(ClientError::validation(format!(
            "Quantity must be {}-{}",
            bound.min, max
        )));
    }
    Ok(quantity)
}

/// Exact batch cost; `None` on overflow
pub fn total_cost(unit_price: Wei, quantity: u32) -> Option<Wei> {
    unit_price.checked_mul(Wei::from(quantity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_to_per_tx_cap() {
        let bound = QuantityBound::unbounded(10);
        assert_eq!(clamp(15, &bound), Ok(10));
        assert_eq!(clamp(0, &bound), Ok(1));
        assert_eq!(clamp(4, &bound), Ok(4));
    }

    #[test]
    fn test_whitelist_allowance() {
        let bound = QuantityBound::for_whitelist(2);
        assert_eq!(bound.effective_max(), Some(2));
        assert_eq!(clamp(5, &bound), Ok(2));

        let exhausted = QuantityBound::for_whitelist(0);
        assert_eq!(exhausted.effective_max(), None);
        assert!(!exhausted.is_available());
        let err = clamp(1, &exhausted).unwrap_err();
        assert_eq!(err.to_string(), "No whitelist mints remaining");
    }

    #[test]
    fn test_supply_allowance() {
        assert_eq!(QuantityBound::for_supply(3).effective_max(), Some(3));
        assert_eq!(QuantityBound::for_supply(500).effective_max(), Some(10));
        assert_eq!(
            clamp(1, &QuantityBound::for_supply(0)).unwrap_err().to_string(),
            "Max supply reached"
        );
    }

    #[test]
    fn test_validate_is_strict() {
        let bound = QuantityBound::for_supply(100);
        assert_eq!(validate(10, &bound), Ok(10));
        assert!(matches!(validate(11, &bound), Err(ClientError::Validation(_))));
        assert!(matches!(validate(0, &bound), Err(ClientError::Validation(_))));
        assert!(matches!(
            validate(1, &QuantityBound::for_whitelist(0)),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn test_total_cost() {
        assert_eq!(
            total_cost(Wei::from(50_000_000_000_000_000u64), 3),
            Some(Wei::from(150_000_000_000_000_000u64))
        );
        assert_eq!(total_cost(Wei::MAX, 2), None);
    }

    fn arb_allowance() -> impl Strategy<Value = DynamicAllowance> {
        prop_oneof![
            (0u64..50).prop_map(DynamicAllowance::SupplyRemaining),
            (0u64..50).prop_map(DynamicAllowance::WhitelistRemaining),
            Just(DynamicAllowance::Unspecified),
        ]
    }

    proptest! {
        #[test]
        fn prop_clamp_stays_in_range(
            requested in 0u32..100,
            min in 0u32..5,
            cap in 0u32..30,
            allowance in arb_allowance(),
        ) {
            let bound = QuantityBound { min, per_tx_cap: cap, dynamic_allowance: allowance };
            let upper = allowance
                .limit()
                .map(|l| u64::from(cap).min(l))
                .unwrap_or(u64::from(cap));

            match clamp(requested, &bound) {
                Ok(q) => {
                    prop_assert!(u64::from(min) <= upper);
                    prop_assert!(q >= min);
                    prop_assert!(u64::from(q) <= upper);
                }
                Err(_) => prop_assert!(upper < u64::from(min)),
            }
        }
    }
}

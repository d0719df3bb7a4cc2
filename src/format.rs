//! Display helpers for amounts, durations, addresses and countdowns

use crate::types::{Address, RarityTier, TxHash, Wei, WEI_PER_ETHER};
use chrono::{DateTime, Utc};

/// Countdown text in `m:ss` form (`125` → `"2:05"`)
pub fn format_countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Render wei as a decimal ether amount without rounding
///
/// Trailing fractional zeros are dropped, so `1.5 ether` prints as `"1.5"`
/// and one ether prints as `"1"`.
pub fn format_ether(wei: Wei) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>18}", frac.to_string());
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Compact human duration (`45s`, `2m 5s`, `3h 4m`, `2d 1h`)
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    if seconds < 3600 {
        return format!("{}m {}s", seconds / 60, seconds % 60);
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours < 24 {
        return format!("{}h {}m", hours, minutes);
    }
    format!("{}d {}h", hours / 24, hours % 24)
}

/// `0x1234...abcd` with `chars` hex digits kept on each side
pub fn truncate_address(address: &Address, chars: usize) -> String {
    let full = address.to_string();
    if full.len() < chars * 2 + 2 {
        return full;
    }
    format!("{}...{}", &full[..chars + 2], &full[full.len() - chars..])
}

/// Tier probability as a percentage (probability is stored in basis points)
pub fn rarity_percentage(tier: &RarityTier) -> f64 {
    tier.probability as f64 / 100.0
}

/// Epoch seconds as an RFC 3339 UTC timestamp
pub fn format_timestamp(epoch_seconds: u64) -> String {
    i64::try_from(epoch_seconds)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| epoch_seconds.to_string())
}

/// Block explorer base URL for known chains
pub fn explorer_url(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("https://etherscan.io"),
        11155111 => Some("https://sepolia.etherscan.io"),
        _ => None,
    }
}

/// Explorer page of a transaction, for known chains
pub fn explorer_tx_url(chain_id: u64, tx_hash: &TxHash) -> Option<String> {
    explorer_url(chain_id).map(|base| format!("{}/tx/{}", base, tx_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(125), "2:05");
        assert_eq!(format_countdown(45), "0:45");
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(3600), "60:00");
    }

    #[test]
    fn test_format_ether() {
        let wei = |n: u64| Wei::from(n);
        assert_eq!(format_ether(wei(50_000_000_000_000_000)), "0.05");
        assert_eq!(format_ether(wei(150_000_000_000_000_000)), "0.15");
        assert_eq!(format_ether(WEI_PER_ETHER), "1");
        assert_eq!(format_ether(wei(1)), "0.000000000000000001");
        assert_eq!(format_ether(Wei::ZERO), "0");
        assert_eq!(format_ether(wei(2_500_000_000_000_000_000)), "2.5");
        // beyond u128
        assert_eq!(
            format_ether(WEI_PER_ETHER << 100),
            (Wei::from(1u64) << 100usize).to_string()
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3 * 3600 + 4 * 60), "3h 4m");
        assert_eq!(format_duration(49 * 3600), "2d 1h");
    }

    #[test]
    fn test_truncate_address() {
        let addr: Address = "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap();
        assert_eq!(truncate_address(&addr, 4), "0x5FbD...0aa3");
        assert_eq!(truncate_address(&addr, 30), addr.to_string());
    }

    #[test]
    fn test_rarity_percentage() {
        let tier = RarityTier {
            name: "Rare".to_string(),
            probability: 2500,
            max_supply: 250,
            current_supply: 10,
            special_attribute: "glow".to_string(),
        };
        assert_eq!(rarity_percentage(&tier), 25.0);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_explorer_url() {
        assert_eq!(explorer_url(1), Some("https://etherscan.io"));
        assert_eq!(explorer_url(11155111), Some("https://sepolia.etherscan.io"));
        assert_eq!(explorer_url(31337), None);

        let hash = TxHash::repeat_byte(0xab);
        assert_eq!(
            explorer_tx_url(1, &hash),
            Some(format!("https://etherscan.io/tx/0x{}", "ab".repeat(32)))
        );
        assert_eq!(explorer_tx_url(31337, &hash), None);
    }
}

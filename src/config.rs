//! Configuration module for the drop client
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use crate::types::{Address, MAX_BATCH_STAKE, MAX_MINT_PER_TX, OWNED_TOKEN_SCAN_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Node endpoint
    pub rpc: RpcConfig,

    /// Drop contract location and limits
    pub contract: ContractConfig,

    /// Signing account
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Auction polling and countdown timing
    #[serde(default)]
    pub auction: AuctionConfig,

    /// Submission and confirmation behaviour
    #[serde(default)]
    pub transactions: TransactionConfig,

    /// Off-chain metadata resolution
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// JSON-RPC endpoint
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// Chain id, used for explorer links
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractConfig {
    /// Deployed drop contract
    pub address: String,

    #[serde(default = "default_max_mint_per_tx")]
    pub max_mint_per_tx: u32,

    #[serde(default = "default_max_batch_stake")]
    pub max_batch_stake: usize,

    /// Upper bound on token ids scanned with `ownerOf`
    #[serde(default = "default_owned_scan_limit")]
    pub owned_token_scan_limit: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    /// Node-managed account used for `eth_sendTransaction`; unset means read-only
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionConfig {
    #[serde(default = "default_price_poll_ms")]
    pub price_poll_interval_ms: u64,

    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,

    /// Drift allowed between a re-read end time and the current target
    #[serde(default = "default_resync_tolerance")]
    pub resync_tolerance_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionConfig {
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Return to Idle right after a confirmed transaction
    #[serde(default = "default_true")]
    pub auto_reset: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataConfig {
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,

    #[serde(default = "default_metadata_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

// Default value functions
fn default_rpc_timeout() -> u64 { 30 }
fn default_chain_id() -> u64 { 31337 }
fn default_max_mint_per_tx() -> u32 { MAX_MINT_PER_TX }
fn default_max_batch_stake() -> usize { MAX_BATCH_STAKE }
fn default_owned_scan_limit() -> u64 { OWNED_TOKEN_SCAN_LIMIT }
fn default_price_poll_ms() -> u64 { 2000 }
fn default_tick_ms() -> u64 { 1000 }
fn default_resync_tolerance() -> u64 { 1 }
fn default_confirmation_timeout() -> u64 { 180 }
fn default_receipt_poll_ms() -> u64 { 1000 }
fn default_ipfs_gateway() -> String { "https://ipfs.io/ipfs/".to_string() }
fn default_metadata_timeout() -> u64 { 10 }
fn default_true() -> bool { true }

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            price_poll_interval_ms: default_price_poll_ms(),
            tick_interval_ms: default_tick_ms(),
            resync_tolerance_secs: default_resync_tolerance(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
            receipt_poll_interval_ms: default_receipt_poll_ms(),
            auto_reset: default_true(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: default_ipfs_gateway(),
            timeout_secs: default_metadata_timeout(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            json_logs: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                url: "http://127.0.0.1:8545".to_string(),
                timeout_secs: default_rpc_timeout(),
                chain_id: default_chain_id(),
            },
            contract: ContractConfig {
                address: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
                max_mint_per_tx: default_max_mint_per_tx(),
                max_batch_stake: default_max_batch_stake(),
                owned_token_scan_limit: default_owned_scan_limit(),
            },
            wallet: WalletConfig::default(),
            auction: AuctionConfig::default(),
            transactions: TransactionConfig::default(),
            metadata: MetadataConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    ///
    /// Without a file the defaults are used as the base.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NFT_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(url) = lookup("NFT_RPC_URL") {
            self.rpc.url = url;
        }
        if let Some(address) = lookup("NFT_CONTRACT_ADDRESS") {
            self.contract.address = address;
        }
        if let Some(account) = lookup("NFT_ACCOUNT") {
            self.wallet.account = Some(account);
        }
        if let Some(gateway) = lookup("NFT_IPFS_GATEWAY") {
            self.metadata.ipfs_gateway = gateway;
        }
        if let Some(chain_id) = lookup("NFT_CHAIN_ID") {
            self.rpc.chain_id = chain_id.parse().map_err(|e| ConfigError::Env {
                var: "NFT_CHAIN_ID",
                reason: format!("{}", e),
            })?;
        }
        Ok(())
    }

    /// Reject configurations the client cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.trim().is_empty() {
            return Err(ConfigError::Validation("rpc.url is empty".to_string()));
        }
        self.contract_address()?;
        self.wallet_account()?;
        if self.contract.max_mint_per_tx == 0 || self.contract.max_batch_stake == 0 {
            return Err(ConfigError::Validation(
                "contract caps must be positive".to_string(),
            ));
        }
        if self.auction.price_poll_interval_ms == 0 || self.auction.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "auction intervals must be positive".to_string(),
            ));
        }
        if self.transactions.receipt_poll_interval_ms == 0
            || self.transactions.confirmation_timeout_secs == 0
        {
            return Err(ConfigError::Validation(
                "transaction timing must be positive".to_string(),
            ));
        }
        if self.metadata.ipfs_gateway.trim().is_empty() {
            return Err(ConfigError::Validation(
                "metadata.ipfs_gateway is empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        self.contract.address.parse().map_err(|e| {
            ConfigError::Validation(format!("contract.address {}: {}", self.contract.address, e))
        })
    }

    pub fn wallet_account(&self) -> Result<Option<Address>, ConfigError> {
        self.wallet
            .account
            .as_deref()
            .map(|a| {
                a.parse()
                    .map_err(|e| ConfigError::Validation(format!("wallet.account {}: {}", a, e)))
            })
            .transpose()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.transactions.confirmation_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.transactions.receipt_poll_interval_ms)
    }

    pub fn price_poll_interval(&self) -> Duration {
        Duration::from_millis(self.auction.price_poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.auction.tick_interval_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transactions.confirmation_timeout_secs, 180);
        assert_eq!(config.auction.price_poll_interval_ms, 2000);
        assert_eq!(config.metadata.ipfs_gateway, "https://ipfs.io/ipfs/");
        assert_eq!(config.contract.max_mint_per_tx, 10);
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
url = "http://localhost:8545"

[contract]
address = "0x5fbdb2315678afecb367f032d93f642f64180aa3"

[transactions]
auto_reset = false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.rpc.url, "http://localhost:8545");
        assert_eq!(config.rpc.timeout_secs, 30);
        assert!(!config.transactions.auto_reset);
        assert_eq!(config.transactions.receipt_poll_interval_ms, 1000);
        assert_eq!(config.auction.tick_interval_ms, 1000);
        assert!(config.wallet.account.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NFT_RPC_URL", "https://rpc.sepolia.org"),
            ("NFT_ACCOUNT", "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"),
            ("NFT_CHAIN_ID", "11155111"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.rpc.url, "https://rpc.sepolia.org");
        assert_eq!(config.rpc.chain_id, 11155111);
        assert!(config.wallet_account().unwrap().is_some());
    }

    #[test]
    fn test_bad_chain_id_override() {
        let mut config = Config::default();
        let err = config
            .apply_env(|var| (var == "NFT_CHAIN_ID").then(|| "sepolia".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "NFT_CHAIN_ID", .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.contract.address = "not-an-address".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = Config::default();
        config.auction.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.wallet.account = Some("0x1234".to_string());
        assert!(config.validate().is_err());
    }
}

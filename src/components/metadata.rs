//! Token metadata resolution
//!
//! `ipfs://` URIs are rewritten onto an HTTP gateway; anything else is
//! fetched as-is. A failed fetch is never fatal: the token keeps
//! `metadata: None` and renders a placeholder.

use crate::config::Config;
use crate::contract::ContractReader;
use crate::errors::{ClientError, ClientResult};
use crate::metrics::metrics;
use crate::types::{NftToken, TokenId, TokenMetadata};
use std::time::Duration;
use tracing::{debug, warn};

const IPFS_SCHEME: &str = "ipfs://";

/// Rewrite an `ipfs://` URI onto `gateway`; other URIs pass through unchanged
pub fn resolve_uri(uri: &str, gateway: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(path) => {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            format!("{}/{}", gateway.trim_end_matches('/'), path)
        }
        None => uri.to_string(),
    }
}

pub struct MetadataClient {
    http: reqwest::Client,
    gateway: String,
}

impl MetadataClient {
    pub fn new(gateway: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::MetadataFetch(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            gateway: gateway.into(),
        })
    }

    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Self::new(config.metadata.ipfs_gateway.clone(), config.metadata_timeout())
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn resolve(&self, uri: &str) -> String {
        resolve_uri(uri, &self.gateway)
    }

    /// Fetch and parse a metadata document; the image URI is resolved too
    pub async fn fetch(&self, uri: &str) -> ClientResult<TokenMetadata> {
        let url = self.resolve(uri);
        debug!(url = %url, "fetching token metadata");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::MetadataFetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::MetadataFetch(format!("{}: HTTP {}", url, status)));
        }

        let mut metadata: TokenMetadata = response
            .json()
            .await
            .map_err(|e| ClientError::MetadataFetch(format!("{}: invalid JSON: {}", url, e)))?;
        metadata.image = metadata.image.map(|image| self.resolve(&image));
        Ok(metadata)
    }

    /// Like [`fetch`](Self::fetch) but failures become `None`
    pub async fn fetch_or_placeholder(&self, uri: &str) -> Option<TokenMetadata> {
        match self.fetch(uri).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                metrics().metadata_fetch_failures.inc();
                warn!(uri, error = %e, "metadata unavailable, using placeholder");
                None
            }
        }
    }

    /// Assemble everything known about one token
    ///
    /// Each contract read is independent: a failed read leaves its field at
    /// the empty default rather than failing the whole token.
    pub async fn token_details(&self, reader: &ContractReader, token_id: TokenId) -> NftToken {
        let (uri, rarity, staked, duration) = futures::join!(
            reader.token_uri(token_id),
            reader.token_rarity(token_id),
            reader.is_token_staked(token_id),
            reader.staking_duration(token_id),
        );

        let token_uri = uri
            .map_err(|e| warn!(token_id, error = %e, "tokenURI read failed"))
            .ok();
        let metadata = match &token_uri {
            Some(uri) => self.fetch_or_placeholder(uri).await,
            None => None,
        };
        let is_staked = staked.unwrap_or(false);

        NftToken {
            token_id,
            token_uri,
            rarity: rarity.ok(),
            is_staked,
            staking_duration: if is_staked { duration.unwrap_or(0) } else { 0 },
            metadata,
        }
    }
}

//! Transaction broadcast.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::{Network, Txid};
use common::BitcoinConfig;
use tracing::debug;

use crate::error::PublishError;

/// Hands raw signed transactions to the network.
#[async_trait]
pub trait ChainPublisher: Send + Sync {
    /// Broadcast consensus-encoded transaction bytes and return the txid
    /// reported by the node.
    async fn publish(&self, raw_transaction: &[u8]) -> Result<Txid, PublishError>;
}

/// Publisher for the Esplora REST API (Blockstream / mempool.space compatible).
#[derive(Debug, Clone)]
pub struct EsploraPublisher {
    api_base: String,
    client: reqwest::Client,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl EsploraPublisher {
    pub fn new(api_base: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(api_base, client))
    }

    /// Use a preconfigured HTTP client (proxies, TLS roots, timeouts).
    pub fn with_client(api_base: impl Into<String>, client: reqwest::Client) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { api_base, client }
    }

    /// Publisher using the public endpoint for `network`.
    pub fn for_network(network: Network) -> Result<Self, PublishError> {
        let api_base = esplora_url(network)
            .ok_or_else(|| PublishError::UnsupportedNetwork(format!("{:?}", network)))?;
        Self::new(api_base)
    }

    /// An explicit `esplora_url` wins over the network preset.
    pub fn from_config(config: &BitcoinConfig) -> Result<Self, PublishError> {
        match &config.esplora_url {
            Some(url) => Self::new(url.as_str()),
            None => Self::for_network(parse_network(&config.network)?),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl ChainPublisher for EsploraPublisher {
    async fn publish(&self, raw_transaction: &[u8]) -> Result<Txid, PublishError> {
        let url = format!("{}/tx", self.api_base);
        debug!("Broadcasting {} bytes to {}", raw_transaction.len(), url);

        let response = self
            .client
            .post(&url)
            .body(hex::encode(raw_transaction))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Failed to read rejection body (status {}): {}", status, e);
                    format!("<failed to read response body: {}>", e)
                }
            };
            return Err(PublishError::Rejected { status, body });
        }

        // Response is just the txid as plain text
        let body = response.text().await?;
        let txid = body.trim();
        Txid::from_str(txid).map_err(|_| PublishError::InvalidTxid(txid.to_string()))
    }
}

/// Public Esplora endpoint for `network`, if one exists.
pub fn esplora_url(network: Network) -> Option<&'static str> {
    match network {
        Network::Bitcoin => Some("https://blockstream.info/api"),
        Network::Testnet => Some("https://blockstream.info/testnet/api"),
        Network::Signet => Some("https://mempool.space/signet/api"),
        _ => None,
    }
}

/// Accepts the usual aliases ("mainnet", "main", "bitcoin", "testnet", ...).
pub fn parse_network(name: &str) -> Result<Network, PublishError> {
    match name.to_lowercase().as_str() {
        "mainnet" | "main" | "bitcoin" => Ok(Network::Bitcoin),
        "testnet" | "test" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" | "reg" => Ok(Network::Regtest),
        _ => Err(PublishError::UnsupportedNetwork(name.to_string())),
    }
}

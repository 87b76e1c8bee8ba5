//! Off-chain JSON metadata referenced by a token metadata account's uri.

use std::time::Duration;

use market_transaction_utils::RetryPolicy;
use serde::{Deserialize, Serialize};
use solana_client::client_error::reqwest;
use tracing::debug;

use crate::error::Error;

pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffChainMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub external_url: Option<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

#[async_trait::async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<OffChainMetadata, Error>;
}

/// Rewrites `ipfs://<cid>` through `gateway` and drops the null padding
/// on-chain strings carry.
pub fn normalize_uri(uri: &str, gateway: &str) -> String {
    let uri = uri.trim_end_matches('\0').trim();
    match uri.strip_prefix("ipfs://") {
        Some(path) => {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            format!("{}/{}", gateway.trim_end_matches('/'), path)
        }
        None => uri.to_string(),
    }
}

pub struct HttpMetadataFetcher {
    http: reqwest::Client,
    gateway: String,
    retry: RetryPolicy,
}

impl HttpMetadataFetcher {
    pub fn new(gateway: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            gateway: gateway.into(),
            retry,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<OffChainMetadata, Error> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        serde_json::from_slice(&body)
            .map_err(|err| Error::InvalidMetadata(format!("{url}: {err}")))
    }
}

#[async_trait::async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str) -> Result<OffChainMetadata, Error> {
        let url = normalize_uri(uri, &self.gateway);
        if url.is_empty() {
            return Err(Error::MetadataUnavailable {
                uri: uri.to_string(),
                reason: "empty uri".to_string(),
            });
        }
        debug!(%url, "fetching metadata");
        self.retry
            .retry(|_| self.fetch_once(&url), Error::is_transient)
            .await
            .map_err(|err| match err {
                Error::MetadataUnavailable { reason, .. } => Error::MetadataUnavailable {
                    uri: url.clone(),
                    reason,
                },
                other => other,
            })
    }
}

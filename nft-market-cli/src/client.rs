use std::{str::FromStr, sync::Arc};

use anyhow::Context;
use market_transaction_utils::{priority_fee, RetryPolicy, SendConfig};
use nft_market_sdk::{
    cache::{CacheStore, FileStore, MemoryStore, OwnershipCache, DEFAULT_PREFIX},
    client::{MarketClient, SolanaRpcClient},
    indexer::ListingIndexer,
    market::{self, FlowConfig, InstructionBundle},
    metadata::HttpMetadataFetcher,
    pda::MarketAddresses,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use tracing::{debug, info};

use crate::{cmd::Opts, result::Result, settings::Settings};

pub type CliCache = OwnershipCache<Box<dyn CacheStore>>;

pub struct CliClient {
    pub market: MarketClient,
    pub payer: Keypair,
    pub flow: FlowConfig,
    pub send_config: SendConfig,
    pub cache: CliCache,
    pub settings: Settings,
}

impl AsRef<SolanaRpcClient> for CliClient {
    fn as_ref(&self) -> &SolanaRpcClient {
        &self.market.solana_client
    }
}

impl CliClient {
    pub async fn new(opts: &Opts, settings: &Settings) -> Result<Self> {
        let rpc_url = opts
            .url
            .clone()
            .or_else(|| settings.rpc_url.clone())
            .context("no rpc url, pass --url or set rpc_url")?;
        let commitment = CommitmentConfig::from_str(&settings.commitment)
            .map_err(|_| anyhow::anyhow!("invalid commitment {}", settings.commitment))?;
        let program_id = Pubkey::from_str(&settings.program_id)
            .with_context(|| format!("invalid program id {}", settings.program_id))?;
        let addresses = MarketAddresses::new(program_id);
        let solana_client = Arc::new(SolanaRpcClient::new_with_commitment(rpc_url, commitment));
        let market = MarketClient::new(solana_client, addresses);
        let payer = opts.load_solana_keypair(settings)?;

        let priority_fee = match settings.priority_fee {
            Some(fee) => fee,
            None => priority_fee::get_estimate(&market, &[program_id]).await?,
        };
        debug!(priority_fee, "using priority fee");

        let store: Box<dyn CacheStore> = match &settings.cache_dir {
            Some(dir) => Box::new(FileStore::new(dir)),
            None => Box::new(MemoryStore::default()),
        };
        let cache = OwnershipCache::new(store, DEFAULT_PREFIX);
        cache.set_active_wallet(Some(payer.pubkey())).await?;

        Ok(Self {
            market,
            payer,
            flow: FlowConfig {
                addresses,
                compute_unit_limit: settings.compute_unit_limit,
                priority_fee: Some(priority_fee),
            },
            send_config: SendConfig {
                retry: settings.retry_policy(),
                ..Default::default()
            },
            cache,
            settings: settings.clone(),
        })
    }

    pub fn indexer(&self) -> Result<ListingIndexer<HttpMetadataFetcher>> {
        let fetcher = HttpMetadataFetcher::new(
            self.settings.metadata_gateway.clone(),
            self.settings.metadata_timeout,
            self.settings.retry_policy(),
        )?;
        Ok(ListingIndexer::new(self.flow.addresses, fetcher))
    }

    /// Submits `bundle` signed by the payer and drops the payer's cached
    /// entries once it confirms.
    pub async fn send(&self, bundle: &InstructionBundle) -> Result<Signature> {
        let signature =
            market::submit(&self.market, bundle, &self.payer, &self.send_config).await?;
        self.cache.record_mutation(&self.payer.pubkey()).await?;
        info!(%signature, "confirmed");
        Ok(signature)
    }
}

impl Settings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }
}

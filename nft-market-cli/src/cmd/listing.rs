use clap::{Args, Subcommand};
use nft_market_sdk::{pda, prelude::*};
use serde::Serialize;
use tracing::warn;

use crate::{
    client::CliClient,
    cmd::{print_submitted, Address, Opts},
    result::Result,
    serde::{print_json, serde_pubkey},
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct ListingCmd {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Args)]
pub struct Terms {
    #[arg(long, help = "Price in lamports")]
    pub price: u64,
    #[arg(long, default_value_t = 0, help = "Listing duration in seconds")]
    pub duration: i64,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Move an NFT held by the wallet into escrow and list it
    Create {
        #[arg(long)]
        mint: Pubkey,
        #[command(flatten)]
        terms: Terms,
    },
    Update {
        #[arg(long)]
        mint: Pubkey,
        #[command(flatten)]
        terms: Terms,
    },
    /// Delist and return the NFT to the wallet
    Cancel {
        #[arg(long)]
        mint: Pubkey,
    },
    Buy {
        #[arg(long)]
        mint: Pubkey,
    },
    Show {
        #[arg(long)]
        mint: Pubkey,
    },
    /// Active listings, optionally only one seller's
    Active {
        #[arg(long, conflicts_with = "mine")]
        seller: Option<Pubkey>,
        #[arg(long, help = "Only the wallet's own listings, served from the cache")]
        mine: bool,
    },
}

impl ListingCmd {
    pub async fn run(&self, opts: Opts, settings: &Settings) -> Result {
        let client = opts.client(settings).await?;
        let wallet = client.payer.pubkey();
        match &self.cmd {
            Cmd::Create { mint, terms } => {
                let bundle = market::list(
                    &client.market,
                    &client.flow,
                    &wallet,
                    mint,
                    terms.price,
                    terms.duration,
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Listing::load(&client, mint).await?)?;
            }
            Cmd::Update { mint, terms } => {
                let bundle = market::update_listing(
                    &client.market,
                    &client.flow,
                    &wallet,
                    mint,
                    terms.price,
                    terms.duration,
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Listing::load(&client, mint).await?)?;
            }
            Cmd::Cancel { mint } => {
                let bundle =
                    market::delist(&client.market, &client.flow, &wallet, mint).await?;
                let signature = client.send(&bundle).await?;
                let (address, _) = client.flow.addresses.listing_key(mint)?;
                print_submitted(signature, Address { address })?;
            }
            Cmd::Buy { mint } => {
                let bundle = market::buy(&client.market, &client.flow, &wallet, mint).await?;
                let signature = client.send(&bundle).await?;
                print_submitted(
                    signature,
                    Purchase {
                        mint: *mint,
                        fee_split: bundle.fee_split,
                    },
                )?;
            }
            Cmd::Show { mint } => print_json(&Listing::load(&client, mint).await?)?,
            Cmd::Active { seller, mine } => {
                if *mine {
                    print_json(&own_listings(&client).await?)?;
                } else {
                    let report = client
                        .indexer()?
                        .scan_active(&client.market, seller.as_ref())
                        .await?;
                    print_json(&report)?;
                }
            }
        }
        Ok(())
    }
}

/// The wallet's listings from the cache, scanning on a miss, narrowed to the
/// ones it can still act on
async fn own_listings(client: &CliClient) -> Result<Vec<CachedRecord>> {
    let wallet = client.payer.pubkey();
    let indexer = client.indexer()?;
    client
        .cache
        .get_or_fetch(&wallet, CacheKind::ListedNft, || async {
            let report = indexer.scan_active(&client.market, Some(&wallet)).await?;
            for warning in &report.warnings {
                warn!(?warning, "left out of cached listings");
            }
            Ok::<_, Error>(
                report
                    .items
                    .iter()
                    .map(|item| item.to_cache_record())
                    .collect(),
            )
        })
        .await?;
    Ok(client
        .cache
        .actionable_listings(&wallet, &client.market)
        .await?)
}

#[derive(Serialize)]
pub struct Listing {
    #[serde(with = "serde_pubkey")]
    pub pubkey: Pubkey,
    #[serde(flatten)]
    pub listing: ListingRecord,
    /// What a buyer would pay under the current fee and royalty
    pub fee_split: FeeSplit,
}

impl Listing {
    async fn load(client: &CliClient, mint: &Pubkey) -> Result<Self> {
        let (pubkey, _) = client.flow.addresses.listing_key(mint)?;
        let listing = client
            .market
            .market_account::<ListingRecord>(&pubkey)
            .await?
            .ok_or_else(|| anyhow::anyhow!("listing {pubkey} not found"))?;
        let fee_bps = market::load_config(&client.market, &client.flow)
            .await?
            .map(|config| config.fee_basis_points)
            .unwrap_or_default();
        let royalty_bps = client
            .market
            .market_account::<CollectibleMetadata>(&pda::metadata_key(mint)?)
            .await?
            .filter(|metadata| !metadata.creators.is_empty())
            .map(|metadata| metadata.seller_fee_basis_points)
            .unwrap_or_default();
        Ok(Self {
            pubkey,
            fee_split: compute_split(listing.price, fee_bps, royalty_bps)?,
            listing,
        })
    }
}

#[derive(Serialize)]
pub struct Purchase {
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
    pub fee_split: Option<FeeSplit>,
}

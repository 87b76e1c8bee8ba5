use std::str::FromStr;

use clap::{Args, Subcommand};
use nft_market_sdk::{instruction::NftMetadataArgs, prelude::*};
use serde::Serialize;
use tracing::warn;

use crate::{
    client::CliClient,
    cmd::{print_submitted, Opts},
    result::Result,
    serde::{print_json, serde_pubkey},
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct NftCmd {
    #[command(subcommand)]
    pub cmd: Cmd,
}

/// Metadata written for a new NFT or collection
#[derive(Debug, Args)]
pub struct MetadataOpts {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub symbol: String,
    #[arg(long)]
    pub uri: String,
    #[arg(long, default_value_t = 0, help = "Royalty in basis points")]
    pub royalty_bps: u16,
    #[arg(
        long = "creator",
        value_parser = parse_creator,
        help = "Creator as ADDRESS:SHARE, repeatable. Defaults to the wallet with 100"
    )]
    pub creators: Vec<Creator>,
}

impl MetadataOpts {
    pub fn to_args(&self, wallet: Pubkey) -> NftMetadataArgs {
        let creators = if self.creators.is_empty() {
            vec![Creator {
                address: wallet,
                verified: false,
                share: 100,
            }]
        } else {
            self.creators.clone()
        };
        NftMetadataArgs {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            uri: self.uri.clone(),
            seller_fee_basis_points: self.royalty_bps,
            creators,
        }
    }
}

fn parse_creator(value: &str) -> std::result::Result<Creator, String> {
    let (address, share) = value
        .split_once(':')
        .ok_or_else(|| format!("expected ADDRESS:SHARE, got {value}"))?;
    Ok(Creator {
        address: Pubkey::from_str(address).map_err(|err| err.to_string())?,
        verified: false,
        share: share.parse().map_err(|_| format!("invalid share {share}"))?,
    })
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Mint a new NFT into a collection, owned by the wallet
    Mint {
        #[arg(long)]
        collection_mint: Pubkey,
        #[command(flatten)]
        metadata: MetadataOpts,
    },
    /// NFTs the wallet currently holds
    Owned {
        #[arg(long, help = "Skip the cache and rescan")]
        refresh: bool,
    },
}

impl NftCmd {
    pub async fn run(&self, opts: Opts, settings: &Settings) -> Result {
        let client = opts.client(settings).await?;
        let wallet = client.payer.pubkey();
        match &self.cmd {
            Cmd::Mint {
                collection_mint,
                metadata,
            } => {
                let mint = Keypair::new();
                let mint_key = mint.pubkey();
                let bundle = market::mint_nft(
                    &client.market,
                    &client.flow,
                    &wallet,
                    mint,
                    collection_mint,
                    &metadata.to_args(wallet),
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Minted { mint: mint_key })?;
            }
            Cmd::Owned { refresh } => {
                if *refresh {
                    client.cache.invalidate(&wallet).await?;
                }
                print_json(&owned(&client).await?)?;
            }
        }
        Ok(())
    }
}

async fn owned(client: &CliClient) -> Result<Vec<CachedRecord>> {
    let wallet = client.payer.pubkey();
    let indexer = client.indexer()?;
    client
        .cache
        .get_or_fetch(&wallet, CacheKind::OwnedNft, || async {
            let report = indexer.scan_owned(&client.market, &wallet).await?;
            for warning in &report.warnings {
                warn!(?warning, "left out of cached collectibles");
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
    Ok(client.cache.actionable_owned(&wallet, &client.market).await?)
}

#[derive(Serialize)]
pub struct Minted {
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
}

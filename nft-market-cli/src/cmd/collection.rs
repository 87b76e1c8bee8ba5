use clap::{Args, Subcommand};
use nft_market_sdk::prelude::*;

use crate::{
    cmd::{nft::MetadataOpts, print_submitted, Address, Opts},
    result::Result,
    serde::print_json,
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct CollectionCmd {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    Create {
        #[command(flatten)]
        metadata: MetadataOpts,
    },
    /// Mark an NFT as a verified member of a collection
    Verify {
        #[arg(long)]
        mint: Pubkey,
        #[arg(long)]
        collection_mint: Pubkey,
    },
    /// Collections created through the marketplace program
    List,
}

impl CollectionCmd {
    pub async fn run(&self, opts: Opts, settings: &Settings) -> Result {
        let client = opts.client(settings).await?;
        let wallet = client.payer.pubkey();
        match &self.cmd {
            Cmd::Create { metadata } => {
                let mint = Keypair::new();
                let address = mint.pubkey();
                let bundle =
                    market::create_collection(&client.flow, &wallet, mint, &metadata.to_args(wallet))?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Address { address })?;
            }
            Cmd::Verify {
                mint,
                collection_mint,
            } => {
                let bundle =
                    market::verify_collection(&client.flow, &wallet, mint, collection_mint)?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Address { address: *mint })?;
            }
            Cmd::List => {
                let report = client.indexer()?.scan_collections(&client.market).await?;
                print_json(&report)?;
            }
        }
        Ok(())
    }
}

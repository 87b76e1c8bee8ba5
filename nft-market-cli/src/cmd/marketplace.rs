use clap::{Args, Subcommand};
use nft_market_sdk::prelude::*;
use serde::Serialize;

use crate::{
    cmd::{print_submitted, Opts},
    result::Result,
    serde::{print_json, serde_pubkey},
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct MarketplaceCmd {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Create the marketplace config with the wallet as authority
    Init {
        #[arg(long, help = "Wallet that receives marketplace fees. Defaults to the authority")]
        treasury: Option<Pubkey>,
        #[arg(long, help = "Marketplace fee in basis points (0-10000)")]
        fee_bps: u16,
    },
    Pause,
    Unpause,
    Show,
}

impl MarketplaceCmd {
    pub async fn run(&self, opts: Opts, settings: &Settings) -> Result {
        let client = opts.client(settings).await?;
        let (config_key, _) = client.flow.addresses.config_key()?;
        match &self.cmd {
            Cmd::Init { treasury, fee_bps } => {
                let authority = client.payer.pubkey();
                let bundle = market::initialize_marketplace(
                    &client.market,
                    &client.flow,
                    &authority,
                    &treasury.unwrap_or(authority),
                    *fee_bps,
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Marketplace::load(&client.market, &client.flow).await?)?;
            }
            Cmd::Pause | Cmd::Unpause => {
                let paused = matches!(self.cmd, Cmd::Pause);
                let bundle = market::set_paused(
                    &client.market,
                    &client.flow,
                    &client.payer.pubkey(),
                    paused,
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(signature, Marketplace::load(&client.market, &client.flow).await?)?;
            }
            Cmd::Show => match market::load_config(&client.market, &client.flow).await? {
                Some(config) => print_json(&Marketplace {
                    pubkey: config_key,
                    config,
                })?,
                None => anyhow::bail!("marketplace config {config_key} not found"),
            },
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct Marketplace {
    #[serde(with = "serde_pubkey")]
    pub pubkey: Pubkey,
    #[serde(flatten)]
    pub config: MarketplaceConfig,
}

impl Marketplace {
    async fn load(client: &MarketClient, flow: &FlowConfig) -> Result<Self> {
        let (pubkey, _) = flow.addresses.config_key()?;
        let config = market::load_config(client, flow)
            .await?
            .ok_or_else(|| anyhow::anyhow!("marketplace config {pubkey} not found"))?;
        Ok(Self { pubkey, config })
    }
}

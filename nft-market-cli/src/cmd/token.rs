use clap::{Args, Subcommand};
use nft_market_sdk::{market::TokenSpec, prelude::*};
use serde::Serialize;

use crate::{
    cmd::{print_submitted, Opts},
    result::Result,
    serde::serde_pubkey,
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct TokenCmd {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Create a fungible token with metadata and mint the supply to the wallet
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "")]
        uri: String,
        #[arg(long, default_value_t = 9)]
        decimals: u8,
        #[arg(long, help = "Supply in whole tokens")]
        amount: u64,
    },
}

impl TokenCmd {
    pub async fn run(&self, opts: Opts, settings: &Settings) -> Result {
        match &self.cmd {
            Cmd::Create {
                name,
                symbol,
                uri,
                decimals,
                amount,
            } => {
                let client = opts.client(settings).await?;
                let spec = TokenSpec {
                    name: name.clone(),
                    symbol: symbol.clone(),
                    uri: uri.clone(),
                    decimals: *decimals,
                    amount: *amount,
                };
                let mint = Keypair::new();
                let mint_key = mint.pubkey();
                let bundle = market::create_token(
                    &client.market,
                    &client.flow,
                    &client.payer.pubkey(),
                    mint,
                    &spec,
                )
                .await?;
                let signature = client.send(&bundle).await?;
                print_submitted(
                    signature,
                    Token {
                        mint: mint_key,
                        decimals: *decimals,
                        supply: spec.base_units()?,
                    },
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct Token {
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
    pub decimals: u8,
    /// In base units
    pub supply: u64,
}

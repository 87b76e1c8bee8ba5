use std::path::PathBuf;

use clap::Args;
use dirs::home_dir;
use serde::Serialize;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::EncodableKey,
};

use crate::{
    client::CliClient,
    result::Result,
    serde::{print_json, serde_pubkey},
    settings::Settings,
};

pub mod collection;
pub mod fees;
pub mod listing;
pub mod marketplace;
pub mod nft;
pub mod token;

/// Common options for commands
#[derive(Debug, Args, Clone)]
pub struct Opts {
    /// Wallet keypair. Overrides keypair_path from the settings
    #[arg(short = 'w', long, global = true)]
    pub wallet: Option<PathBuf>,

    /// Solana RPC URL to use. Overrides rpc_url from the settings
    #[arg(long, short, global = true)]
    pub url: Option<String>,
}

impl Opts {
    pub fn default_wallet_path() -> PathBuf {
        let mut path = home_dir().unwrap_or_else(|| PathBuf::from("/"));
        path.push(".config/solana/id.json");
        path
    }

    pub fn load_solana_keypair(&self, settings: &Settings) -> Result<Keypair> {
        let path = self
            .wallet
            .clone()
            .or_else(|| settings.keypair_path.clone())
            .unwrap_or_else(Opts::default_wallet_path);
        Keypair::read_from_file(&path)
            .map_err(|_| anyhow::anyhow!("Failed to read keypair from {}", path.display()))
    }

    pub async fn client(&self, settings: &Settings) -> Result<CliClient> {
        CliClient::new(self, settings).await
    }
}

#[derive(Serialize)]
pub struct Submitted<T: Serialize> {
    pub signature: String,
    #[serde(flatten)]
    pub details: T,
}

#[derive(Serialize)]
pub struct Address {
    #[serde(with = "serde_pubkey")]
    pub address: Pubkey,
}

pub fn print_submitted<T: Serialize>(signature: Signature, details: T) -> Result {
    print_json(&Submitted {
        signature: signature.to_string(),
        details,
    })
}

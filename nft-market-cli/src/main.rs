use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nft_market_cli::{
    cmd::{collection, fees, listing, marketplace, nft, token, Opts},
    result::Result,
    settings::Settings,
};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "nft-market")]
#[command(about = "NFT marketplace client")]
struct Cli {
    /// Optional configuration file to use
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    opts: Opts,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    Marketplace(marketplace::MarketplaceCmd),
    Listing(listing::ListingCmd),
    Nft(nft::NftCmd),
    Collection(collection::CollectionCmd),
    Token(token::TokenCmd),
    Fees(fees::FeesCmd),
}

#[tokio::main]
async fn main() -> Result {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_ref()).context("loading settings")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.log))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();

    run(cli, settings).await
}

async fn run(cli: Cli, settings: Settings) -> Result {
    match cli.cmd {
        Cmd::Marketplace(cmd) => cmd.run(cli.opts, &settings).await,
        Cmd::Listing(cmd) => cmd.run(cli.opts, &settings).await,
        Cmd::Nft(cmd) => cmd.run(cli.opts, &settings).await,
        Cmd::Collection(cmd) => cmd.run(cli.opts, &settings).await,
        Cmd::Token(cmd) => cmd.run(cli.opts, &settings).await,
        Cmd::Fees(cmd) => cmd.run(),
    }
}

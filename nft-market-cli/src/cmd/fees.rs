use clap::Args;
use nft_market_sdk::fees::compute_split;

use crate::{result::Result, serde::print_json};

/// Price breakdown for a sale, computed locally
#[derive(Debug, Args)]
pub struct FeesCmd {
    #[arg(long, help = "Listing price in lamports")]
    pub price: u64,
    #[arg(long, default_value_t = 0)]
    pub fee_bps: u16,
    #[arg(long, default_value_t = 0)]
    pub royalty_bps: u16,
}

impl FeesCmd {
    pub fn run(&self) -> Result {
        print_json(&compute_split(self.price, self.fee_bps, self.royalty_bps)?)
    }
}

pub use nft_market_sdk::serde::{serde_opt_pubkey, serde_pubkey};

pub fn print_json<T: ?Sized + serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use std::{path::Path, path::PathBuf, time::Duration};

use config::{Config, Environment, File};
use nft_market_sdk::{metadata::DEFAULT_GATEWAY, pda::MARKET_PROGRAM_ID};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// RUST_LOG compatible settings string. Default "info"
    #[serde(default = "default_log")]
    pub log: String,
    pub rpc_url: Option<String>,
    /// Defaults to the Solana CLI keypair
    pub keypair_path: Option<PathBuf>,
    #[serde(default = "default_program_id")]
    pub program_id: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
    /// Micro lamports per compute unit. Estimated from recent fees when unset
    pub priority_fee: Option<u64>,
    #[serde(default = "default_metadata_gateway")]
    pub metadata_gateway: String,
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout: Duration,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,
    /// Persist the ownership cache here. In memory only when unset
    pub cache_dir: Option<PathBuf>,
}

fn default_log() -> String {
    "info".to_string()
}

fn default_program_id() -> String {
    MARKET_PROGRAM_ID.to_string()
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_compute_unit_limit() -> u32 {
    300_000
}

fn default_metadata_gateway() -> String {
    DEFAULT_GATEWAY.to_string()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

impl Settings {
    /// Load Settings from a given path. Settings are loaded from a given
    /// optional path and can be overriden with environment variables.
    ///
    /// Environment overrides have the same name as the entries in the settings
    /// file in uppercase and prefixed with "NFT_MARKET__". For example
    /// "NFT_MARKET__LOG" will override the log setting. The same double
    /// underscore distinguishes subsections in the settings file
    pub fn new<P: AsRef<Path>>(path: Option<P>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        if let Some(file) = path {
            builder = builder
                .add_source(File::with_name(&file.as_ref().to_string_lossy()).required(false));
        }
        builder
            .add_source(Environment::with_prefix("NFT_MARKET").separator("__"))
            .build()
            .and_then(|config| config.try_deserialize())
    }
}

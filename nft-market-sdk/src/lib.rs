pub mod accounts;
pub mod cache;
pub mod client;
pub mod error;
pub mod fees;
pub mod indexer;
pub mod instruction;
pub mod layout;
pub mod market;
pub mod metadata;
pub mod pda;
pub mod serde;

pub use error::{DecodeError, Error};
pub use market_transaction_utils;

pub mod prelude {
    pub use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

    pub use crate::{
        accounts::{
            AccountLayout, CollectibleMetadata, Creator, ListingRecord, MarketAccount,
            MarketplaceConfig,
        },
        cache::{CacheKind, CacheStore, CachedRecord, FileStore, MemoryStore, OwnershipCache},
        client::{ChainState, GetAccount, GetMarketAccount, MarketClient, ScanProgramAccounts},
        fees::{compute_split, FeeSplit},
        indexer::{ListingIndexer, ScanReport, ScanWarning},
        market::{self, FlowConfig, InstructionBundle},
        metadata::{HttpMetadataFetcher, MetadataFetcher},
        pda::MarketAddresses,
        Error,
    };
}

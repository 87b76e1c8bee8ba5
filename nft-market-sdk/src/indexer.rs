use futures::{stream, StreamExt};
use itertools::Itertools;
use serde::Serialize;
use solana_sdk::{account::Account, pubkey::Pubkey};
use tracing::{debug, warn};

use crate::{
    accounts::{
        AccountLayout, CollectibleMetadata, ListingRecord, MintAccount, TokenAccount,
        FIRST_CREATOR_OFFSET, LISTING_DISCRIMINATOR, METADATA_V1_KEY,
    },
    cache::CachedRecord,
    client::{ChainState, GetAccount, ScanFilter, ScanProgramAccounts},
    error::Error,
    market::TOKEN_ACCOUNT_SIZE,
    metadata::{MetadataFetcher, OffChainMetadata},
    pda::{self, ListingSeeds, MarketAddresses, TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID},
    serde::serde_pubkey,
};

const DEFAULT_FETCH_CONCURRENCY: usize = 8;
/// Seller follows the 8 byte discriminator
const SELLER_OFFSET: usize = 8;
const TOKEN_OWNER_OFFSET: usize = 32;

/// Why a scanned account was left out of the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ScanWarning {
    Decode {
        #[serde(with = "serde_pubkey")]
        address: Pubkey,
        error: String,
    },
    /// Listing written under the retired `listing_v2` seed
    LegacySeed {
        #[serde(with = "serde_pubkey")]
        address: Pubkey,
        #[serde(with = "serde_pubkey")]
        mint: Pubkey,
    },
    AddressMismatch {
        #[serde(with = "serde_pubkey")]
        address: Pubkey,
        #[serde(with = "serde_pubkey")]
        expected: Pubkey,
    },
    Expired {
        #[serde(with = "serde_pubkey")]
        address: Pubkey,
        expires_at: i64,
    },
    MissingMetadata {
        #[serde(with = "serde_pubkey")]
        mint: Pubkey,
    },
    MetadataUnavailable {
        #[serde(with = "serde_pubkey")]
        mint: Pubkey,
        uri: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport<T> {
    pub items: Vec<T>,
    pub warnings: Vec<ScanWarning>,
}

impl<T> Default for ScanReport<T> {
    fn default() -> Self {
        Self {
            items: vec![],
            warnings: vec![],
        }
    }
}

impl<T> ScanReport<T> {
    fn warn(&mut self, warning: ScanWarning) {
        warn!(?warning, "skipping account");
        self.warnings.push(warning);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedListing {
    #[serde(with = "serde_pubkey")]
    pub address: Pubkey,
    pub listing: ListingRecord,
    pub metadata: CollectibleMetadata,
    pub off_chain: OffChainMetadata,
}

impl IndexedListing {
    pub fn to_cache_record(&self) -> CachedRecord {
        CachedRecord::Listing {
            address: self.address,
            listing: self.listing.clone(),
            metadata: Some(self.metadata.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedCollectible {
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub token_account: Pubkey,
    pub metadata: CollectibleMetadata,
}

impl OwnedCollectible {
    pub fn to_cache_record(&self) -> CachedRecord {
        CachedRecord::Collectible {
            mint: self.mint,
            metadata: Some(self.metadata.clone()),
        }
    }
}

pub struct ListingIndexer<F> {
    addresses: MarketAddresses,
    fetcher: F,
    concurrency: usize,
}

impl<F: MetadataFetcher> ListingIndexer<F> {
    pub fn new(addresses: MarketAddresses, fetcher: F) -> Self {
        Self {
            addresses,
            fetcher,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Checks that `address` is where the program would have put a listing
    /// for `listing.nft_mint`.
    fn check_address(&self, address: &Pubkey, listing: &ListingRecord) -> Result<(), ScanWarning> {
        let mint = listing.nft_mint;
        let canonical = self.addresses.listing_key(&mint).ok().map(|(key, _)| key);
        if canonical == Some(*address) {
            return Ok(());
        }
        let legacy = self
            .addresses
            .listing_key_with(ListingSeeds::Legacy, &mint)
            .ok()
            .map(|(key, _)| key);
        if legacy == Some(*address) {
            return Err(ScanWarning::LegacySeed {
                address: *address,
                mint,
            });
        }
        Err(ScanWarning::AddressMismatch {
            address: *address,
            expected: canonical.unwrap_or_default(),
        })
    }

    /// Active, unexpired listings joined with their on-chain and off-chain
    /// metadata. Accounts that fail any step are reported as warnings rather
    /// than failing the scan.
    pub async fn scan_active<C>(
        &self,
        client: &C,
        seller: Option<&Pubkey>,
    ) -> Result<ScanReport<IndexedListing>, Error>
    where
        C: GetAccount + ScanProgramAccounts + ChainState + Sync + ?Sized,
    {
        let mut filters = vec![ScanFilter::memcmp(0, LISTING_DISCRIMINATOR)];
        if let Some(seller) = seller {
            filters.push(ScanFilter::memcmp(SELLER_OFFSET, seller));
        }
        let scanned = client.scan(&self.addresses.program_id, filters).await?;
        let now = client.unix_timestamp().await?;
        debug!(count = scanned.len(), now, "scanned listing accounts");

        let mut report = ScanReport::default();
        let mut candidates = vec![];
        for (address, account) in scanned {
            let listing = match ListingRecord::decode(&account.data) {
                Ok(listing) => listing,
                Err(err) => {
                    report.warn(ScanWarning::Decode {
                        address,
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            if let Err(warning) = self.check_address(&address, &listing) {
                report.warn(warning);
                continue;
            }
            if !listing.is_active || seller.is_some_and(|seller| *seller != listing.seller) {
                continue;
            }
            if let Some(expires_at) = listing.expires_at.filter(|_| listing.is_expired(now)) {
                report.warn(ScanWarning::Expired {
                    address,
                    expires_at,
                });
                continue;
            }
            candidates.push((address, listing));
        }

        let mints = candidates.iter().map(|(_, listing)| listing.nft_mint).collect_vec();
        let metadata = read_metadata(client, &mints).await?;
        let joined = candidates
            .into_iter()
            .zip(metadata)
            .filter_map(|((address, listing), metadata)| match metadata {
                Some(metadata) => Some((address, listing, metadata)),
                None => {
                    report.warn(ScanWarning::MissingMetadata {
                        mint: listing.nft_mint,
                    });
                    None
                }
            })
            .collect_vec();

        let fetched = stream::iter(joined)
            .map(|(address, listing, metadata)| async move {
                let off_chain = self.fetcher.fetch(&metadata.uri).await;
                (address, listing, metadata, off_chain)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;
        for (address, listing, metadata, off_chain) in fetched {
            match off_chain {
                Ok(off_chain) => report.items.push(IndexedListing {
                    address,
                    listing,
                    metadata,
                    off_chain,
                }),
                Err(err) => report.warn(ScanWarning::MetadataUnavailable {
                    mint: listing.nft_mint,
                    uri: metadata.uri,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// NFTs held by `owner`: token accounts with exactly one unit of a zero
    /// decimal, single supply mint
    pub async fn scan_owned<C>(
        &self,
        client: &C,
        owner: &Pubkey,
    ) -> Result<ScanReport<OwnedCollectible>, Error>
    where
        C: GetAccount + ScanProgramAccounts + Sync + ?Sized,
    {
        let scanned = client
            .scan(
                &TOKEN_PROGRAM_ID,
                vec![
                    ScanFilter::DataSize(TOKEN_ACCOUNT_SIZE as u64),
                    ScanFilter::memcmp(TOKEN_OWNER_OFFSET, owner),
                ],
            )
            .await?;
        let mut report = ScanReport::default();
        let holdings = scanned
            .into_iter()
            .filter_map(|(address, account)| match TokenAccount::decode(&account.data) {
                Ok(token) => (token.amount == 1 && token.owner == *owner).then_some((address, token)),
                Err(err) => {
                    report.warn(ScanWarning::Decode {
                        address,
                        error: err.to_string(),
                    });
                    None
                }
            })
            .collect_vec();

        let mints = holdings.iter().map(|(_, token)| token.mint).collect_vec();
        let mint_accounts = client.accounts(&mints).await?;
        let nfts = holdings
            .into_iter()
            .zip(mint_accounts)
            .filter_map(|((token_account, token), (_, mint_account))| {
                decode_present::<MintAccount>(mint_account)
                    .is_some_and(|mint| mint.is_nft())
                    .then_some((token_account, token.mint))
            })
            .collect_vec();

        let mints = nfts.iter().map(|(_, mint)| *mint).collect_vec();
        let metadata = read_metadata(client, &mints).await?;
        for ((token_account, mint), metadata) in nfts.into_iter().zip(metadata) {
            match metadata {
                Some(metadata) => report.items.push(OwnedCollectible {
                    mint,
                    token_account,
                    metadata,
                }),
                None => report.warn(ScanWarning::MissingMetadata { mint }),
            }
        }
        Ok(report)
    }

    /// Metadata accounts whose first creator is the program's mint authority
    pub async fn scan_collections<C>(
        &self,
        client: &C,
    ) -> Result<ScanReport<CollectibleMetadata>, Error>
    where
        C: ScanProgramAccounts + Sync + ?Sized,
    {
        let (mint_authority, _) = self.addresses.mint_authority_key()?;
        let scanned = client
            .scan(
                &TOKEN_METADATA_PROGRAM_ID,
                vec![
                    ScanFilter::memcmp(0, [METADATA_V1_KEY]),
                    ScanFilter::memcmp(FIRST_CREATOR_OFFSET, mint_authority),
                ],
            )
            .await?;
        let mut report = ScanReport::default();
        for (address, account) in scanned {
            match CollectibleMetadata::decode(&account.data) {
                Ok(metadata) => report.items.push(metadata),
                Err(err) => report.warn(ScanWarning::Decode {
                    address,
                    error: err.to_string(),
                }),
            }
        }
        Ok(report)
    }
}

fn decode_present<T: AccountLayout>(account: Option<Account>) -> Option<T> {
    account.and_then(|account| T::decode(&account.data).ok())
}

/// Token metadata for each mint, in order. Missing or undecodable accounts
/// come back as `None`.
async fn read_metadata<C: GetAccount + Sync + ?Sized>(
    client: &C,
    mints: &[Pubkey],
) -> Result<Vec<Option<CollectibleMetadata>>, Error> {
    let keys = mints
        .iter()
        .map(pda::metadata_key)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(client
        .accounts(&keys)
        .await?
        .into_iter()
        .map(|(_, account)| decode_present(account))
        .collect())
}

//! Per-owner cache of observed NFTs and listings, bound to the active wallet.
//!
//! Entries are only hints. Anything surfaced as actionable goes through a
//! live custody check first, see [`OwnershipCache::actionable_owned`] and
//! [`OwnershipCache::actionable_listings`].

use std::{
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    accounts::{AccountLayout, CollectibleMetadata, ListingRecord, TokenAccount},
    client::GetAccount,
    error::Error,
    pda,
    serde::serde_pubkey,
};

pub const DEFAULT_PREFIX: &str = "nft-market";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheKind {
    OwnedNft,
    ListedNft,
}

impl CacheKind {
    pub const ALL: [CacheKind; 2] = [CacheKind::OwnedNft, CacheKind::ListedNft];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::OwnedNft => "owned-nft",
            CacheKind::ListedNft => "listed-nft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CachedRecord {
    Listing {
        #[serde(with = "serde_pubkey")]
        address: Pubkey,
        listing: ListingRecord,
        metadata: Option<CollectibleMetadata>,
    },
    Collectible {
        #[serde(with = "serde_pubkey")]
        mint: Pubkey,
        metadata: Option<CollectibleMetadata>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "serde_pubkey")]
    pub owner: Pubkey,
    pub kind: CacheKind,
    pub records: Vec<CachedRecord>,
    /// Unix seconds
    pub fetched_at: i64,
}

impl CacheEntry {
    pub fn new(owner: Pubkey, kind: CacheKind, records: Vec<CachedRecord>) -> Self {
        let fetched_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default();
        Self {
            owner,
            kind,
            records,
            fetched_at,
        }
    }
}

/// String key value storage behind the cache
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, Error>;
    async fn save(&self, key: &str, value: String) -> Result<(), Error>;
    async fn remove(&self, key: &str) -> Result<(), Error>;
    async fn remove_prefix(&self, prefix: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: String) -> Result<(), Error> {
        (**self).save(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        (**self).remove(key).await
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), Error> {
        (**self).remove_prefix(prefix).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    async fn save(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), Error> {
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

/// One JSON file per key inside `dir`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_stem(key: &str) -> String {
        key.replace([':', '/', '\\'], "_")
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(key)))
    }
}

#[async_trait::async_trait]
impl CacheStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, Error> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::cache_store(err)),
        }
    }

    async fn save(&self, key: &str, value: String) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(Error::cache_store)?;
        tokio::fs::write(self.path(key), value)
            .await
            .map_err(Error::cache_store)
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(Error::cache_store(err)),
            _ => Ok(()),
        }
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<(), Error> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(Error::cache_store(err)),
        };
        let stem = Self::file_stem(prefix);
        while let Some(file) = dir.next_entry().await.map_err(Error::cache_store)? {
            if file.file_name().to_string_lossy().starts_with(&stem) {
                tokio::fs::remove_file(file.path())
                    .await
                    .map_err(Error::cache_store)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct BoundWallet {
    #[serde(with = "serde_pubkey")]
    wallet: Pubkey,
}

#[derive(Default)]
struct InFlight {
    lock: Mutex<()>,
    // bumped on every invalidation of the owner so a fetch that started
    // before it is not written back
    generation: AtomicU64,
}

pub struct OwnershipCache<S = MemoryStore> {
    store: S,
    prefix: String,
    active_wallet: RwLock<Option<Pubkey>>,
    in_flight: DashMap<Pubkey, Arc<InFlight>>,
    epoch: AtomicU64,
}

impl Default for OwnershipCache<MemoryStore> {
    fn default() -> Self {
        Self::new(MemoryStore::default(), DEFAULT_PREFIX)
    }
}

impl<S: CacheStore> OwnershipCache<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            active_wallet: RwLock::new(None),
            in_flight: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self, owner: &Pubkey, kind: CacheKind) -> String {
        format!("{}:{}:{}", self.prefix, owner, kind.as_str())
    }

    fn wallet_key(&self) -> String {
        format!("{}:active-wallet", self.prefix)
    }

    pub async fn active_wallet(&self) -> Option<Pubkey> {
        *self.active_wallet.read().await
    }

    async fn stored_wallet(&self) -> Result<Option<Pubkey>, Error> {
        let key = self.wallet_key();
        let Some(raw) = self.store.load(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<BoundWallet>(&raw) {
            Ok(bound) => Ok(Some(bound.wallet)),
            Err(err) => {
                warn!(?err, %key, "unreadable wallet binding");
                Ok(None)
            }
        }
    }

    /// Binds the cache to `wallet`. The binding lives in the store, so a
    /// persistent store keeps its entries across restarts with the same
    /// wallet. Switching to a different wallet (or disconnecting) drops
    /// every entry. Returns whether anything changed.
    pub async fn set_active_wallet(&self, wallet: Option<Pubkey>) -> Result<bool, Error> {
        let mut active = self.active_wallet.write().await;
        let previous = self.stored_wallet().await?;
        *active = wallet;
        if previous == wallet {
            return Ok(false);
        }
        info!(?previous, next = ?wallet, "wallet changed, clearing cache");
        self.invalidate_all().await?;
        if let Some(wallet) = wallet {
            self.store
                .save(&self.wallet_key(), serde_json::to_string(&BoundWallet { wallet })?)
                .await?;
        }
        Ok(true)
    }

    pub async fn get(&self, owner: &Pubkey, kind: CacheKind) -> Result<Option<CacheEntry>, Error> {
        let key = self.key(owner, kind);
        let Some(raw) = self.store.load(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(?err, %key, "dropping unreadable cache entry");
                self.store.remove(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        let key = self.key(&entry.owner, entry.kind);
        self.store.save(&key, serde_json::to_string(entry)?).await
    }

    pub async fn invalidate(&self, owner: &Pubkey) -> Result<(), Error> {
        if let Some(flight) = self.in_flight.get(owner) {
            flight.generation.fetch_add(1, Ordering::SeqCst);
        }
        for kind in CacheKind::ALL {
            self.store.remove(&self.key(owner, kind)).await?;
        }
        Ok(())
    }

    pub async fn invalidate_all(&self) -> Result<(), Error> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.store.remove_prefix(&format!("{}:", self.prefix)).await
    }

    /// Call once a mint, list, buy or delist involving `owner` has confirmed.
    /// The next read refetches.
    pub async fn record_mutation(&self, owner: &Pubkey) -> Result<(), Error> {
        debug!(%owner, "invalidating after mutation");
        self.invalidate(owner).await
    }

    fn version(&self, flight: &InFlight) -> (u64, u64) {
        (
            self.epoch.load(Ordering::SeqCst),
            flight.generation.load(Ordering::SeqCst),
        )
    }

    /// Returns the cached entry or runs `fetch` to populate it. At most one
    /// fetch per owner runs at a time; concurrent callers wait for it and
    /// then read its result.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        owner: &Pubkey,
        kind: CacheKind,
        fetch: F,
    ) -> Result<CacheEntry, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CachedRecord>, Error>>,
    {
        let flight = self.in_flight.entry(*owner).or_default().clone();
        let result = {
            let _fetching = flight.lock.lock().await;
            self.fetch_locked(owner, kind, &flight, fetch).await
        };
        drop(flight);
        // last one out removes the owner's slot
        self.in_flight
            .remove_if(owner, |_, flight| Arc::strong_count(flight) == 1);
        result
    }

    async fn fetch_locked<F, Fut>(
        &self,
        owner: &Pubkey,
        kind: CacheKind,
        flight: &InFlight,
        fetch: F,
    ) -> Result<CacheEntry, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<CachedRecord>, Error>>,
    {
        if let Some(entry) = self.get(owner, kind).await? {
            return Ok(entry);
        }
        let version = self.version(flight);
        let entry = CacheEntry::new(*owner, kind, fetch().await?);
        if self.version(flight) == version {
            self.put(&entry).await?;
        } else {
            debug!(%owner, "cache invalidated during fetch, not storing");
        }
        Ok(entry)
    }

    /// Cached NFTs that `owner` still holds right now
    pub async fn actionable_owned<C: GetAccount + Sync + ?Sized>(
        &self,
        owner: &Pubkey,
        client: &C,
    ) -> Result<Vec<CachedRecord>, Error> {
        let Some(entry) = self.get(owner, CacheKind::OwnedNft).await? else {
            return Ok(vec![]);
        };
        let candidates = entry
            .records
            .into_iter()
            .filter_map(|record| {
                let CachedRecord::Collectible { mint, .. } = &record else {
                    return None;
                };
                let mint = *mint;
                pda::associated_token_key(owner, &mint)
                    .ok()
                    .map(|ata| (ata, mint, record))
            })
            .collect::<Vec<_>>();
        let keys = candidates.iter().map(|(ata, _, _)| *ata).collect::<Vec<_>>();
        let live = client.accounts(&keys).await?;
        Ok(candidates
            .into_iter()
            .zip(live)
            .filter_map(|((_, mint, record), (ata, account))| {
                let held = account
                    .and_then(|account| TokenAccount::decode(&account.data).ok())
                    .is_some_and(|token| {
                        token.amount == 1 && token.owner == *owner && token.mint == mint
                    });
                if !held {
                    debug!(%owner, %mint, %ata, "no longer held");
                }
                held.then_some(record)
            })
            .collect())
    }

    /// Cached listings that are still active and still `owner`'s, refreshed
    /// with their live state
    pub async fn actionable_listings<C: GetAccount + Sync + ?Sized>(
        &self,
        owner: &Pubkey,
        client: &C,
    ) -> Result<Vec<CachedRecord>, Error> {
        let Some(entry) = self.get(owner, CacheKind::ListedNft).await? else {
            return Ok(vec![]);
        };
        let candidates = entry
            .records
            .into_iter()
            .filter(|record| matches!(record, CachedRecord::Listing { .. }))
            .collect::<Vec<_>>();
        let keys = candidates
            .iter()
            .filter_map(|record| match record {
                CachedRecord::Listing { address, .. } => Some(*address),
                CachedRecord::Collectible { .. } => None,
            })
            .collect::<Vec<_>>();
        let live = client.accounts(&keys).await?;
        Ok(candidates
            .into_iter()
            .zip(live)
            .filter_map(|(record, (address, account))| {
                let current = account
                    .and_then(|account| ListingRecord::decode(&account.data).ok())
                    .filter(|listing| listing.is_active && listing.seller == *owner);
                match (record, current) {
                    (CachedRecord::Listing { metadata, .. }, Some(listing)) => {
                        Some(CachedRecord::Listing {
                            address,
                            listing,
                            metadata,
                        })
                    }
                    _ => {
                        debug!(%owner, %address, "listing no longer actionable");
                        None
                    }
                }
            })
            .collect())
    }
}

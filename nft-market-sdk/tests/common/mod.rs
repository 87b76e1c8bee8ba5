#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Mutex,
    },
};

use market_transaction_utils::sender::{BlockHashData, SendTransaction, SignatureStatus};
use nft_market_sdk::{
    accounts::{
        AccountLayout, CollectibleMetadata, Creator, ListingRecord, MarketplaceConfig,
        MintAccount, TokenAccount, MINT_ACCOUNT_SIZE,
    },
    client::{ChainState, GetAccount, ScanFilter, ScanProgramAccounts},
    market::TOKEN_ACCOUNT_SIZE,
    metadata::{MetadataFetcher, OffChainMetadata},
    pda::{self, MarketAddresses, TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID},
    Error,
};
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

pub const NOW: i64 = 1_700_000_000;
pub const LISTING_ALLOCATION: usize = 176;
pub const CONFIG_ALLOCATION: usize = 81;

/// In-memory cluster: accounts keyed by address, balances, a clock and a log
/// of submitted transactions
pub struct MockChain {
    pub accounts: Mutex<HashMap<Pubkey, Account>>,
    pub balances: Mutex<HashMap<Pubkey, u64>>,
    pub now: AtomicI64,
    pub account_reads: AtomicUsize,
    pub scans: AtomicUsize,
    pub sent: Mutex<Vec<VersionedTransaction>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            accounts: Mutex::default(),
            balances: Mutex::default(),
            now: AtomicI64::new(NOW),
            account_reads: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            sent: Mutex::default(),
        }
    }
}

impl MockChain {
    pub fn set_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(
            address,
            Account {
                lamports: 1_000_000,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().unwrap().remove(address);
    }

    pub fn fund(&self, wallet: &Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(*wallet, lamports);
    }

    pub fn put_listing(&self, addresses: &MarketAddresses, address: Pubkey, listing: &ListingRecord) {
        let mut data = listing.encode().unwrap();
        data.resize(LISTING_ALLOCATION, 0);
        self.set_account(address, addresses.program_id, data);
    }

    pub fn put_canonical_listing(&self, addresses: &MarketAddresses, listing: &ListingRecord) -> Pubkey {
        let (address, _) = addresses.listing_key(&listing.nft_mint).unwrap();
        self.put_listing(addresses, address, listing);
        address
    }

    pub fn put_config(&self, addresses: &MarketAddresses, config: &MarketplaceConfig) -> Pubkey {
        let (address, _) = addresses.config_key().unwrap();
        let mut data = config.encode().unwrap();
        data.resize(CONFIG_ALLOCATION, 0);
        self.set_account(address, addresses.program_id, data);
        address
    }

    pub fn put_metadata(&self, metadata: &CollectibleMetadata) -> Pubkey {
        let address = pda::metadata_key(&metadata.mint).unwrap();
        let mut data = metadata.encode().unwrap();
        data.extend_from_slice(&[0, 1, 1, 255]);
        self.set_account(address, TOKEN_METADATA_PROGRAM_ID, data);
        address
    }

    pub fn put_token_account(&self, owner: &Pubkey, mint: &Pubkey, amount: u64) -> Pubkey {
        let address = pda::associated_token_key(owner, mint).unwrap();
        let mut data = TokenAccount {
            mint: *mint,
            owner: *owner,
            amount,
        }
        .encode()
        .unwrap();
        data.resize(TOKEN_ACCOUNT_SIZE, 0);
        self.set_account(address, TOKEN_PROGRAM_ID, data);
        address
    }

    pub fn put_mint(&self, mint: &Pubkey, supply: u64, decimals: u8) {
        let mut data = MintAccount {
            mint_authority: Some(Pubkey::new_unique()),
            supply,
            decimals,
            is_initialized: true,
        }
        .encode()
        .unwrap();
        data.resize(MINT_ACCOUNT_SIZE, 0);
        self.set_account(*mint, TOKEN_PROGRAM_ID, data);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl GetAccount for MockChain {
    async fn account(&self, pubkey: &Pubkey) -> Result<Option<Account>, Error> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().unwrap().get(pubkey).cloned())
    }

    async fn accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<(Pubkey, Option<Account>)>, Error> {
        self.account_reads.fetch_add(pubkeys.len(), Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        Ok(pubkeys
            .iter()
            .map(|key| (*key, accounts.get(key).cloned()))
            .collect())
    }
}

#[async_trait::async_trait]
impl ScanProgramAccounts for MockChain {
    async fn scan(
        &self,
        program_id: &Pubkey,
        filters: Vec<ScanFilter>,
    ) -> Result<Vec<(Pubkey, Account)>, Error> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        let mut matched: Vec<_> = accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| filters.iter().all(|filter| filter.matches(&account.data)))
            .map(|(key, account)| (*key, account.clone()))
            .collect();
        matched.sort_by_key(|(key, _)| *key);
        Ok(matched)
    }
}

#[async_trait::async_trait]
impl ChainState for MockChain {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, Error> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(pubkey)
            .copied()
            .unwrap_or_default())
    }

    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, Error> {
        Ok((data_len as u64 + 128) * 6_960)
    }

    async fn unix_timestamp(&self) -> Result<i64, Error> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}

#[async_trait::async_trait]
impl SendTransaction for MockChain {
    async fn latest_blockhash(&self) -> Result<BlockHashData, market_transaction_utils::Error> {
        Ok(BlockHashData {
            last_valid_block_height: 150,
            last_valid_blockhash: Hash::new_from_array([7; 32]),
        })
    }

    async fn block_height(&self) -> Result<u64, market_transaction_utils::Error> {
        Ok(0)
    }

    async fn send(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, market_transaction_utils::Error> {
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures[0])
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, market_transaction_utils::Error> {
        Ok(Some(SignatureStatus {
            err: None,
            confirmed: true,
        }))
    }
}

/// Serves canned documents by uri and fails for anything else
#[derive(Default)]
pub struct StaticFetcher {
    pub documents: HashMap<String, OffChainMetadata>,
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl MetadataFetcher for StaticFetcher {
    async fn fetch(&self, uri: &str) -> Result<OffChainMetadata, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::MetadataUnavailable {
                uri: uri.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

pub fn creator(address: Pubkey) -> Creator {
    Creator {
        address,
        verified: true,
        share: 100,
    }
}

pub fn metadata(mint: Pubkey, creators: Vec<Creator>, royalty_bps: u16) -> CollectibleMetadata {
    CollectibleMetadata {
        update_authority: Pubkey::new_unique(),
        mint,
        name: format!("Owl {}", &mint.to_string()[..4]),
        symbol: "OWL".to_string(),
        uri: format!("https://meta.example/{mint}.json"),
        seller_fee_basis_points: royalty_bps,
        creators,
    }
}

pub fn off_chain(name: &str) -> OffChainMetadata {
    OffChainMetadata {
        name: Some(name.to_string()),
        image: Some(format!("https://img.example/{name}.png")),
        ..Default::default()
    }
}

/// Active listing at its canonical address with the escrow the program uses
pub fn listing(
    addresses: &MarketAddresses,
    seller: Pubkey,
    mint: Pubkey,
    price: u64,
    expires_at: Option<i64>,
) -> ListingRecord {
    let (_, bump) = addresses.listing_key(&mint).unwrap();
    ListingRecord {
        seller,
        nft_mint: mint,
        price,
        owner_token_account: pda::associated_token_key(&seller, &mint).unwrap(),
        escrow_token_account: addresses.escrow_key(&mint).unwrap(),
        created_at: NOW - 3_600,
        expires_at,
        is_active: true,
        bump,
    }
}

pub fn config(authority: Pubkey, fee_basis_points: u16) -> MarketplaceConfig {
    MarketplaceConfig {
        authority,
        treasury_wallet: Pubkey::new_unique(),
        fee_basis_points,
        is_paused: false,
        bump: 255,
    }
}

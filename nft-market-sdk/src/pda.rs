use solana_sdk::{pubkey, pubkey::Pubkey};

use crate::error::Error;

pub const MARKET_PROGRAM_ID: Pubkey = pubkey!("CFSd2NBvuNZY16M3jcYZufyZbhdok4esET8N2kyEdVrs");
pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
    pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

pub const MARKETPLACE_SEED: &[u8] = b"marketplace";
pub const LISTING_SEED: &[u8] = b"listing";
pub const LEGACY_LISTING_SEED: &[u8] = b"listing_v2";
pub const AUTHORITY_SEED: &[u8] = b"authority";
pub const METADATA_SEED: &[u8] = b"metadata";
pub const EDITION_SEED: &[u8] = b"edition";

/// Searches bumps from 255 down and returns the first address off the ed25519
/// curve together with its bump.
pub fn derive(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<(Pubkey, u8), Error> {
    Pubkey::try_find_program_address(seeds, program_id).ok_or(Error::AddressDerivationExhausted)
}

fn derive_key(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<Pubkey, Error> {
    derive(program_id, seeds).map(|(key, _)| key)
}

/// Seed conventions that have been used for listing accounts. The deployed
/// program only accepts `Canonical`; `Legacy` is kept to recognise accounts
/// written by older clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingSeeds {
    #[default]
    Canonical,
    Legacy,
}

impl ListingSeeds {
    pub fn prefix(&self) -> &'static [u8] {
        match self {
            ListingSeeds::Canonical => LISTING_SEED,
            ListingSeeds::Legacy => LEGACY_LISTING_SEED,
        }
    }
}

/// Addresses owned by one deployment of the marketplace program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAddresses {
    pub program_id: Pubkey,
}

impl Default for MarketAddresses {
    fn default() -> Self {
        Self::new(MARKET_PROGRAM_ID)
    }
}

impl MarketAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn config_key(&self) -> Result<(Pubkey, u8), Error> {
        derive(&self.program_id, &[MARKETPLACE_SEED])
    }

    pub fn mint_authority_key(&self) -> Result<(Pubkey, u8), Error> {
        derive(&self.program_id, &[AUTHORITY_SEED])
    }

    pub fn listing_key(&self, mint: &Pubkey) -> Result<(Pubkey, u8), Error> {
        self.listing_key_with(ListingSeeds::Canonical, mint)
    }

    pub fn listing_key_with(
        &self,
        seeds: ListingSeeds,
        mint: &Pubkey,
    ) -> Result<(Pubkey, u8), Error> {
        derive(&self.program_id, &[seeds.prefix(), mint.as_ref()])
    }

    /// Token account holding `mint` while it is listed
    pub fn escrow_key(&self, mint: &Pubkey) -> Result<Pubkey, Error> {
        let (listing, _) = self.listing_key(mint)?;
        associated_token_key(&listing, mint)
    }
}

pub fn metadata_key(mint: &Pubkey) -> Result<Pubkey, Error> {
    derive_key(
        &TOKEN_METADATA_PROGRAM_ID,
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
    )
}

pub fn master_edition_key(mint: &Pubkey) -> Result<Pubkey, Error> {
    derive_key(
        &TOKEN_METADATA_PROGRAM_ID,
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            EDITION_SEED,
        ],
    )
}

/// Associated token account of `owner` for `mint`. `owner` may itself be a
/// program derived address.
pub fn associated_token_key(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey, Error> {
    derive_key(
        &ASSOCIATED_TOKEN_PROGRAM_ID,
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
    )
}

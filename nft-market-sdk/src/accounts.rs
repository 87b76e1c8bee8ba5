//! Typed records for the accounts the marketplace reads, each backed by a
//! [`Layout`] table.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::{
    error::DecodeError,
    layout::{Field, FieldKind, Fields, Layout, Value},
    serde::serde_pubkey,
};

/// `sha256("account:ListingAccount")[..8]`
pub const LISTING_DISCRIMINATOR: [u8; 8] = [59, 89, 136, 25, 21, 196, 183, 13];
/// `sha256("account:MarketplaceConfig")[..8]`
pub const MARKETPLACE_CONFIG_DISCRIMINATOR: [u8; 8] = [169, 22, 247, 131, 182, 200, 81, 124];
/// Token metadata `Key::MetadataV1`
pub const METADATA_V1_KEY: u8 = 4;

pub const MAX_NAME_LENGTH: usize = 32;
pub const MAX_SYMBOL_LENGTH: usize = 10;
pub const MAX_URI_LENGTH: usize = 200;
pub const MAX_BASIS_POINTS: u16 = 10_000;

pub const LISTING_LAYOUT: Layout = Layout {
    name: "ListingAccount",
    version: 1,
    discriminator: &LISTING_DISCRIMINATOR,
    fields: &[
        Field::new("seller", FieldKind::Pubkey),
        Field::new("nft_mint", FieldKind::Pubkey),
        Field::new("price", FieldKind::U64),
        Field::new("token_account", FieldKind::Pubkey),
        Field::new("escrow_token_account", FieldKind::Pubkey),
        Field::new("created_at", FieldKind::I64),
        Field::new("expires_at", FieldKind::Option(&FieldKind::I64)),
        Field::new("is_active", FieldKind::Bool),
        Field::new("bump", FieldKind::U8),
    ],
};

pub const MARKETPLACE_CONFIG_LAYOUT: Layout = Layout {
    name: "MarketplaceConfig",
    version: 1,
    discriminator: &MARKETPLACE_CONFIG_DISCRIMINATOR,
    fields: &[
        Field::new("authority", FieldKind::Pubkey),
        Field::new("treasury_wallet", FieldKind::Pubkey),
        Field::new("fee_percentage", FieldKind::U16),
        Field::new("is_paused", FieldKind::Bool),
        Field::new("bump", FieldKind::U8),
    ],
};

pub const CREATOR_FIELDS: &[Field] = &[
    Field::new("address", FieldKind::Pubkey),
    Field::new("verified", FieldKind::Bool),
    Field::new("share", FieldKind::U8),
];

/// Prefix of a token metadata account up to and including the creators.
/// Everything after (sale flags, edition nonce, collection) is ignored.
pub const METADATA_LAYOUT: Layout = Layout {
    name: "Metadata",
    version: 1,
    discriminator: &[METADATA_V1_KEY],
    fields: &[
        Field::new("update_authority", FieldKind::Pubkey),
        Field::new("mint", FieldKind::Pubkey),
        Field::new("name", FieldKind::PaddedString(MAX_NAME_LENGTH)),
        Field::new("symbol", FieldKind::PaddedString(MAX_SYMBOL_LENGTH)),
        Field::new("uri", FieldKind::PaddedString(MAX_URI_LENGTH)),
        Field::new("seller_fee_basis_points", FieldKind::U16),
        Field::new(
            "creators",
            FieldKind::Option(&FieldKind::Vec(CREATOR_FIELDS)),
        ),
    ],
};

/// Offset of the first creator's address in a padded metadata account
pub const FIRST_CREATOR_OFFSET: usize = METADATA_LAYOUT.min_size() + 4;

pub const TOKEN_ACCOUNT_LAYOUT: Layout = Layout {
    name: "TokenAccount",
    version: 1,
    discriminator: &[],
    fields: &[
        Field::new("mint", FieldKind::Pubkey),
        Field::new("owner", FieldKind::Pubkey),
        Field::new("amount", FieldKind::U64),
    ],
};

pub const MINT_LAYOUT: Layout = Layout {
    name: "Mint",
    version: 1,
    discriminator: &[],
    fields: &[
        Field::new("mint_authority_option", FieldKind::U32),
        Field::new("mint_authority", FieldKind::Pubkey),
        Field::new("supply", FieldKind::U64),
        Field::new("decimals", FieldKind::U8),
        Field::new("is_initialized", FieldKind::Bool),
    ],
};

/// Size the token program requires for a mint account
pub const MINT_ACCOUNT_SIZE: usize = 82;

/// Record with a fixed wire layout
pub trait AccountLayout: Sized {
    const LAYOUT: Layout;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError>;
    fn to_fields(&self) -> Fields;

    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        Self::from_fields(&Self::LAYOUT.decode(data)?)
    }

    fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Self::LAYOUT.encode(&self.to_fields())
    }
}

pub fn decode<T: AccountLayout>(data: &[u8]) -> Result<T, DecodeError> {
    T::decode(data)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(with = "serde_pubkey")]
    pub seller: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub nft_mint: Pubkey,
    pub price: u64,
    #[serde(with = "serde_pubkey")]
    pub owner_token_account: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub escrow_token_account: Pubkey,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub is_active: bool,
    pub bump: u8,
}

impl ListingRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Active and not past its expiry
    pub fn is_purchasable(&self, now: i64) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

impl AccountLayout for ListingRecord {
    const LAYOUT: Layout = LISTING_LAYOUT;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            seller: fields.pubkey("seller")?,
            nft_mint: fields.pubkey("nft_mint")?,
            price: fields.u64("price")?,
            owner_token_account: fields.pubkey("token_account")?,
            escrow_token_account: fields.pubkey("escrow_token_account")?,
            created_at: fields.i64("created_at")?,
            expires_at: fields.option_i64("expires_at")?,
            is_active: fields.bool("is_active")?,
            bump: fields.u8("bump")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("seller", Value::Pubkey(self.seller))
            .with("nft_mint", Value::Pubkey(self.nft_mint))
            .with("price", Value::U64(self.price))
            .with("token_account", Value::Pubkey(self.owner_token_account))
            .with(
                "escrow_token_account",
                Value::Pubkey(self.escrow_token_account),
            )
            .with("created_at", Value::I64(self.created_at))
            .with(
                "expires_at",
                Value::Option(self.expires_at.map(|v| Box::new(Value::I64(v)))),
            )
            .with("is_active", Value::Bool(self.is_active))
            .with("bump", Value::U8(self.bump))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(with = "serde_pubkey")]
    pub authority: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub treasury_wallet: Pubkey,
    pub fee_basis_points: u16,
    pub is_paused: bool,
    pub bump: u8,
}

impl AccountLayout for MarketplaceConfig {
    const LAYOUT: Layout = MARKETPLACE_CONFIG_LAYOUT;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let fee_basis_points = fields.u16("fee_percentage")?;
        if fee_basis_points > MAX_BASIS_POINTS {
            return Err(DecodeError::invalid(
                "fee_percentage",
                format!("{fee_basis_points} exceeds {MAX_BASIS_POINTS}"),
            ));
        }
        Ok(Self {
            authority: fields.pubkey("authority")?,
            treasury_wallet: fields.pubkey("treasury_wallet")?,
            fee_basis_points,
            is_paused: fields.bool("is_paused")?,
            bump: fields.u8("bump")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("authority", Value::Pubkey(self.authority))
            .with("treasury_wallet", Value::Pubkey(self.treasury_wallet))
            .with("fee_percentage", Value::U16(self.fee_basis_points))
            .with("is_paused", Value::Bool(self.is_paused))
            .with("bump", Value::U8(self.bump))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(with = "serde_pubkey")]
    pub address: Pubkey,
    pub verified: bool,
    pub share: u8,
}

impl Creator {
    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            address: fields.pubkey("address")?,
            verified: fields.bool("verified")?,
            share: fields.u8("share")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("address", Value::Pubkey(self.address))
            .with("verified", Value::Bool(self.verified))
            .with("share", Value::U8(self.share))
    }
}

/// Shares must add up to exactly 100 unless there are no creators at all
pub fn validate_creator_shares(creators: &[Creator]) -> Result<(), DecodeError> {
    if creators.is_empty() {
        return Ok(());
    }
    let total: u32 = creators.iter().map(|c| c.share as u32).sum();
    if total != 100 {
        return Err(DecodeError::invalid(
            "creators",
            format!("shares sum to {total}, expected 100"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectibleMetadata {
    #[serde(with = "serde_pubkey")]
    pub update_authority: Pubkey,
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
}

impl CollectibleMetadata {
    /// Royalties go to the first listed creator
    pub fn royalty_recipient(&self) -> Option<&Pubkey> {
        self.creators.first().map(|c| &c.address)
    }
}

impl AccountLayout for CollectibleMetadata {
    const LAYOUT: Layout = METADATA_LAYOUT;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let seller_fee_basis_points = fields.u16("seller_fee_basis_points")?;
        if seller_fee_basis_points > MAX_BASIS_POINTS {
            return Err(DecodeError::invalid(
                "seller_fee_basis_points",
                format!("{seller_fee_basis_points} exceeds {MAX_BASIS_POINTS}"),
            ));
        }
        let creators = fields
            .option_list("creators")?
            .unwrap_or_default()
            .iter()
            .map(Creator::from_fields)
            .collect::<Result<Vec<_>, _>>()?;
        validate_creator_shares(&creators)?;
        Ok(Self {
            update_authority: fields.pubkey("update_authority")?,
            mint: fields.pubkey("mint")?,
            name: fields.string("name")?,
            symbol: fields.string("symbol")?,
            uri: fields.string("uri")?,
            seller_fee_basis_points,
            creators,
        })
    }

    fn to_fields(&self) -> Fields {
        let creators = (!self.creators.is_empty()).then(|| {
            Box::new(Value::List(
                self.creators.iter().map(Creator::to_fields).collect(),
            ))
        });
        Fields::new()
            .with("update_authority", Value::Pubkey(self.update_authority))
            .with("mint", Value::Pubkey(self.mint))
            .with("name", Value::Str(self.name.clone()))
            .with("symbol", Value::Str(self.symbol.clone()))
            .with("uri", Value::Str(self.uri.clone()))
            .with(
                "seller_fee_basis_points",
                Value::U16(self.seller_fee_basis_points),
            )
            .with("creators", Value::Option(creators))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

impl AccountLayout for TokenAccount {
    const LAYOUT: Layout = TOKEN_ACCOUNT_LAYOUT;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        Ok(Self {
            mint: fields.pubkey("mint")?,
            owner: fields.pubkey("owner")?,
            amount: fields.u64("amount")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("mint", Value::Pubkey(self.mint))
            .with("owner", Value::Pubkey(self.owner))
            .with("amount", Value::U64(self.amount))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintAccount {
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
}

impl MintAccount {
    pub fn is_nft(&self) -> bool {
        self.decimals == 0 && self.supply == 1
    }
}

impl AccountLayout for MintAccount {
    const LAYOUT: Layout = MINT_LAYOUT;

    fn from_fields(fields: &Fields) -> Result<Self, DecodeError> {
        let mint_authority = match fields.get("mint_authority_option")? {
            Value::U32(0) => None,
            Value::U32(1) => Some(fields.pubkey("mint_authority")?),
            other => {
                return Err(DecodeError::invalid(
                    "mint_authority_option",
                    format!("unexpected {other:?}"),
                ))
            }
        };
        Ok(Self {
            mint_authority,
            supply: fields.u64("supply")?,
            decimals: fields.u8("decimals")?,
            is_initialized: fields.bool("is_initialized")?,
        })
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with(
                "mint_authority_option",
                Value::U32(self.mint_authority.is_some() as u32),
            )
            .with(
                "mint_authority",
                Value::Pubkey(self.mint_authority.unwrap_or_default()),
            )
            .with("supply", Value::U64(self.supply))
            .with("decimals", Value::U8(self.decimals))
            .with("is_initialized", Value::Bool(self.is_initialized))
    }
}

/// Any account the marketplace knows how to read, selected by its prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketAccount {
    Listing(ListingRecord),
    Config(MarketplaceConfig),
    Metadata(CollectibleMetadata),
}

impl MarketAccount {
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.starts_with(&LISTING_DISCRIMINATOR) {
            ListingRecord::decode(data).map(Self::Listing)
        } else if data.starts_with(&MARKETPLACE_CONFIG_DISCRIMINATOR) {
            MarketplaceConfig::decode(data).map(Self::Config)
        } else if data.first() == Some(&METADATA_V1_KEY) {
            CollectibleMetadata::decode(data).map(Self::Metadata)
        } else {
            Err(DecodeError::DiscriminatorMismatch {
                layout: "MarketAccount",
                actual: data.iter().take(8).copied().collect(),
            })
        }
    }
}

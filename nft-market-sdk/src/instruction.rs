//! Raw instructions for the marketplace program and the token programs it
//! works alongside. Nothing here touches the network; see [`crate::market`]
//! for flows that read state before building.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::{
    accounts::{
        validate_creator_shares, Creator, CREATOR_FIELDS, MAX_BASIS_POINTS, MAX_NAME_LENGTH,
        MAX_SYMBOL_LENGTH, MAX_URI_LENGTH,
    },
    error::Error,
    layout::{Field, FieldKind, Fields, Layout, Value},
    pda::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID},
};

/// `sha256("global:<instruction>")[..8]` for each program entry point
pub mod discriminator {
    pub const LIST_NFT: [u8; 8] = [88, 221, 93, 166, 63, 220, 106, 232];
    pub const BUY_NFT: [u8; 8] = [96, 0, 28, 190, 49, 107, 83, 222];
    pub const DELIST_NFT: [u8; 8] = [91, 249, 165, 185, 22, 7, 119, 176];
    pub const UPDATE_LISTING: [u8; 8] = [192, 174, 210, 68, 116, 40, 242, 253];
    pub const MINT_NFT: [u8; 8] = [211, 57, 6, 167, 15, 219, 35, 251];
    pub const CREATE_COLLECTION: [u8; 8] = [156, 251, 92, 54, 233, 2, 16, 82];
    pub const VERIFY_COLLECTION: [u8; 8] = [56, 113, 101, 253, 79, 55, 122, 169];
    pub const INITIALIZE_MARKETPLACE: [u8; 8] = [47, 81, 64, 0, 96, 56, 105, 7];
    pub const PAUSE_MARKETPLACE: [u8; 8] = [110, 211, 176, 142, 101, 22, 196, 225];
    pub const UNPAUSE_MARKETPLACE: [u8; 8] = [239, 246, 197, 175, 255, 203, 133, 127];
}

const LISTING_TERMS: &[Field] = &[
    Field::new("price", FieldKind::U64),
    Field::new("duration", FieldKind::I64),
];

pub const LIST_NFT_ARGS: Layout = Layout {
    name: "list_nft",
    version: 1,
    discriminator: &discriminator::LIST_NFT,
    fields: LISTING_TERMS,
};

pub const UPDATE_LISTING_ARGS: Layout = Layout {
    name: "update_listing",
    version: 1,
    discriminator: &discriminator::UPDATE_LISTING,
    fields: LISTING_TERMS,
};

pub const INITIALIZE_MARKETPLACE_ARGS: Layout = Layout {
    name: "initialize_marketplace",
    version: 1,
    discriminator: &discriminator::INITIALIZE_MARKETPLACE,
    fields: &[Field::new("fee_percentage", FieldKind::U16)],
};

const NFT_METADATA_FIELDS: &[Field] = &[
    Field::new("name", FieldKind::String),
    Field::new("symbol", FieldKind::String),
    Field::new("uri", FieldKind::String),
    Field::new("seller_fee_basis_points", FieldKind::U16),
    Field::new("creators", FieldKind::Vec(CREATOR_FIELDS)),
];

pub const MINT_NFT_ARGS: Layout = Layout {
    name: "mint_nft",
    version: 1,
    discriminator: &discriminator::MINT_NFT,
    fields: NFT_METADATA_FIELDS,
};

pub const CREATE_COLLECTION_ARGS: Layout = Layout {
    name: "create_collection",
    version: 1,
    discriminator: &discriminator::CREATE_COLLECTION,
    fields: NFT_METADATA_FIELDS,
};

/// Account lists in the exact order the program reads them
pub trait ToAccountMetas {
    fn to_account_metas(&self) -> Vec<AccountMeta>;
}

pub mod accounts {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    pub struct ListNft {
        pub owner: Pubkey,
        pub listing: Pubkey,
        pub nft_mint: Pubkey,
        pub owner_token: Pubkey,
        pub escrow_token: Pubkey,
        pub config: Pubkey,
    }

    impl ToAccountMetas for ListNft {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.owner, true),
                AccountMeta::new(self.listing, false),
                AccountMeta::new_readonly(self.nft_mint, false),
                AccountMeta::new(self.owner_token, false),
                AccountMeta::new(self.escrow_token, false),
                AccountMeta::new_readonly(self.config, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct BuyNft {
        pub buyer: Pubkey,
        pub seller: Pubkey,
        pub config: Pubkey,
        pub listing: Pubkey,
        pub nft_mint: Pubkey,
        pub seller_token: Pubkey,
        pub escrow_token: Pubkey,
        pub buyer_token: Pubkey,
        pub treasury: Pubkey,
        pub creator: Pubkey,
    }

    impl ToAccountMetas for BuyNft {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.buyer, true),
                AccountMeta::new(self.seller, false),
                AccountMeta::new(self.config, false),
                AccountMeta::new(self.listing, false),
                AccountMeta::new(self.nft_mint, false),
                AccountMeta::new(self.seller_token, false),
                AccountMeta::new(self.escrow_token, false),
                AccountMeta::new(self.buyer_token, false),
                AccountMeta::new(self.treasury, false),
                AccountMeta::new(self.creator, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DelistNft {
        pub owner: Pubkey,
        pub listing: Pubkey,
        pub nft_mint: Pubkey,
        pub owner_token: Pubkey,
        pub escrow_token: Pubkey,
    }

    impl ToAccountMetas for DelistNft {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.owner, true),
                AccountMeta::new(self.listing, false),
                AccountMeta::new_readonly(self.nft_mint, false),
                AccountMeta::new(self.owner_token, false),
                AccountMeta::new(self.escrow_token, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct UpdateListing {
        pub listing: Pubkey,
        pub nft_mint: Pubkey,
        pub seller: Pubkey,
    }

    impl ToAccountMetas for UpdateListing {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.listing, false),
                AccountMeta::new_readonly(self.nft_mint, false),
                AccountMeta::new(self.seller, true),
            ]
        }
    }

    /// `mint_authority` is writable as the program declares it, but never a
    /// signer here: it is a program address and the program signs for it.
    #[derive(Debug, Clone, Copy)]
    pub struct MintNft {
        pub owner: Pubkey,
        pub mint: Pubkey,
        pub mint_authority: Pubkey,
        pub metadata: Pubkey,
        pub master_edition: Pubkey,
        pub destination: Pubkey,
        pub collection_mint: Pubkey,
        pub collection_metadata: Pubkey,
        pub collection_master_edition: Pubkey,
    }

    impl ToAccountMetas for MintNft {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.owner, true),
                AccountMeta::new(self.mint, false),
                AccountMeta::new(self.mint_authority, false),
                AccountMeta::new(self.metadata, false),
                AccountMeta::new(self.master_edition, false),
                AccountMeta::new(self.destination, false),
                AccountMeta::new(self.collection_mint, false),
                AccountMeta::new(self.collection_metadata, false),
                AccountMeta::new(self.collection_master_edition, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct CreateCollection {
        pub user: Pubkey,
        pub mint: Pubkey,
        pub mint_authority: Pubkey,
        pub metadata: Pubkey,
        pub master_edition: Pubkey,
        pub destination: Pubkey,
    }

    impl ToAccountMetas for CreateCollection {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.user, true),
                AccountMeta::new(self.mint, true),
                AccountMeta::new_readonly(self.mint_authority, false),
                AccountMeta::new(self.metadata, false),
                AccountMeta::new(self.master_edition, false),
                AccountMeta::new(self.destination, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct VerifyCollection {
        pub authority: Pubkey,
        pub metadata: Pubkey,
        pub mint: Pubkey,
        pub mint_authority: Pubkey,
        pub collection_mint: Pubkey,
        pub collection_metadata: Pubkey,
        pub collection_master_edition: Pubkey,
    }

    impl ToAccountMetas for VerifyCollection {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.authority, true),
                AccountMeta::new(self.metadata, false),
                AccountMeta::new_readonly(self.mint, false),
                AccountMeta::new_readonly(self.mint_authority, false),
                AccountMeta::new_readonly(self.collection_mint, false),
                AccountMeta::new(self.collection_metadata, false),
                AccountMeta::new_readonly(self.collection_master_edition, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(sysvar::instructions::ID, false),
                AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct InitializeMarketplace {
        pub authority: Pubkey,
        pub config: Pubkey,
        pub treasury: Pubkey,
    }

    impl ToAccountMetas for InitializeMarketplace {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.authority, true),
                AccountMeta::new(self.config, false),
                AccountMeta::new_readonly(self.treasury, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ]
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub struct SetPaused {
        pub config: Pubkey,
        pub authority: Pubkey,
    }

    impl ToAccountMetas for SetPaused {
        fn to_account_metas(&self) -> Vec<AccountMeta> {
            vec![
                AccountMeta::new(self.config, false),
                AccountMeta::new_readonly(self.authority, true),
            ]
        }
    }
}

/// Metadata the program writes for a new NFT or collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftMetadataArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
}

impl NftMetadataArgs {
    pub fn validate(&self) -> Result<(), Error> {
        let too_long = [
            ("name", self.name.len(), MAX_NAME_LENGTH),
            ("symbol", self.symbol.len(), MAX_SYMBOL_LENGTH),
            ("uri", self.uri.len(), MAX_URI_LENGTH),
        ]
        .into_iter()
        .find(|(_, len, max)| len > max);
        if let Some((field, len, max)) = too_long {
            return Err(Error::InvalidMetadata(format!(
                "{field} is {len} bytes, limit is {max}"
            )));
        }
        if self.seller_fee_basis_points > MAX_BASIS_POINTS {
            return Err(Error::InvalidMetadata(format!(
                "seller fee {} exceeds {MAX_BASIS_POINTS}",
                self.seller_fee_basis_points
            )));
        }
        if self.creators.is_empty() {
            return Err(Error::InvalidMetadata("at least one creator is required".to_string()));
        }
        validate_creator_shares(&self.creators)
            .map_err(|err| Error::InvalidMetadata(err.to_string()))
    }

    fn to_fields(&self) -> Fields {
        Fields::new()
            .with("name", Value::Str(self.name.clone()))
            .with("symbol", Value::Str(self.symbol.clone()))
            .with("uri", Value::Str(self.uri.clone()))
            .with(
                "seller_fee_basis_points",
                Value::U16(self.seller_fee_basis_points),
            )
            .with(
                "creators",
                Value::List(
                    self.creators
                        .iter()
                        .map(|creator| {
                            Fields::new()
                                .with("address", Value::Pubkey(creator.address))
                                .with("verified", Value::Bool(creator.verified))
                                .with("share", Value::U8(creator.share))
                        })
                        .collect(),
                ),
            )
    }
}

fn listing_terms(price: u64, duration: i64) -> Fields {
    Fields::new()
        .with("price", Value::U64(price))
        .with("duration", Value::I64(duration))
}

pub fn list_nft(
    program_id: Pubkey,
    accounts: accounts::ListNft,
    price: u64,
    duration: i64,
) -> Result<Instruction, Error> {
    Ok(Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: LIST_NFT_ARGS.encode(&listing_terms(price, duration))?,
    })
}

pub fn update_listing(
    program_id: Pubkey,
    accounts: accounts::UpdateListing,
    price: u64,
    duration: i64,
) -> Result<Instruction, Error> {
    Ok(Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: UPDATE_LISTING_ARGS.encode(&listing_terms(price, duration))?,
    })
}

pub fn buy_nft(program_id: Pubkey, accounts: accounts::BuyNft) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: discriminator::BUY_NFT.to_vec(),
    }
}

pub fn delist_nft(program_id: Pubkey, accounts: accounts::DelistNft) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: discriminator::DELIST_NFT.to_vec(),
    }
}

pub fn mint_nft(
    program_id: Pubkey,
    accounts: accounts::MintNft,
    metadata: &NftMetadataArgs,
) -> Result<Instruction, Error> {
    metadata.validate()?;
    Ok(Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: MINT_NFT_ARGS.encode(&metadata.to_fields())?,
    })
}

pub fn create_collection(
    program_id: Pubkey,
    accounts: accounts::CreateCollection,
    metadata: &NftMetadataArgs,
) -> Result<Instruction, Error> {
    metadata.validate()?;
    Ok(Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: CREATE_COLLECTION_ARGS.encode(&metadata.to_fields())?,
    })
}

pub fn verify_collection(program_id: Pubkey, accounts: accounts::VerifyCollection) -> Instruction {
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: discriminator::VERIFY_COLLECTION.to_vec(),
    }
}

pub fn initialize_marketplace(
    program_id: Pubkey,
    accounts: accounts::InitializeMarketplace,
    fee_basis_points: u16,
) -> Result<Instruction, Error> {
    if fee_basis_points > MAX_BASIS_POINTS {
        return Err(Error::InvalidFeeParameters(format!(
            "{fee_basis_points} basis points exceeds {MAX_BASIS_POINTS}"
        )));
    }
    Ok(Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: INITIALIZE_MARKETPLACE_ARGS
            .encode(&Fields::new().with("fee_percentage", Value::U16(fee_basis_points)))?,
    })
}

pub fn set_paused(program_id: Pubkey, accounts: accounts::SetPaused, paused: bool) -> Instruction {
    let data = if paused {
        discriminator::PAUSE_MARKETPLACE
    } else {
        discriminator::UNPAUSE_MARKETPLACE
    };
    Instruction {
        program_id,
        accounts: accounts.to_account_metas(),
        data: data.to_vec(),
    }
}

/// Token program and associated token program instructions
pub mod spl {
    use super::*;

    const INITIALIZE_MINT: u8 = 0;
    const MINT_TO: u8 = 7;

    /// `idempotent` succeeds even if the account was created in the meantime
    pub fn create_associated_token_account(
        payer: &Pubkey,
        wallet: &Pubkey,
        mint: &Pubkey,
        idempotent: bool,
    ) -> Result<Instruction, Error> {
        let ata = crate::pda::associated_token_key(wallet, mint)?;
        Ok(Instruction {
            program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*payer, true),
                AccountMeta::new(ata, false),
                AccountMeta::new_readonly(*wallet, false),
                AccountMeta::new_readonly(*mint, false),
                AccountMeta::new_readonly(system_program::ID, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            ],
            data: if idempotent { vec![1] } else { vec![] },
        })
    }

    pub fn initialize_mint(
        mint: &Pubkey,
        decimals: u8,
        mint_authority: &Pubkey,
        freeze_authority: Option<&Pubkey>,
    ) -> Instruction {
        let mut data = Vec::with_capacity(67);
        data.push(INITIALIZE_MINT);
        data.push(decimals);
        data.extend_from_slice(mint_authority.as_ref());
        match freeze_authority {
            Some(freeze) => {
                data.push(1);
                data.extend_from_slice(freeze.as_ref());
            }
            None => data.push(0),
        }
        Instruction {
            program_id: TOKEN_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*mint, false),
                AccountMeta::new_readonly(sysvar::rent::ID, false),
            ],
            data,
        }
    }

    pub fn mint_to(
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Instruction {
        let mut data = vec![MINT_TO];
        data.extend_from_slice(&amount.to_le_bytes());
        Instruction {
            program_id: TOKEN_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(*mint, false),
                AccountMeta::new(*destination, false),
                AccountMeta::new_readonly(*authority, true),
            ],
            data,
        }
    }
}

/// Token metadata program instructions
pub mod token_metadata {
    use super::*;

    const COLLECTION_FIELDS: &[Field] = &[
        Field::new("verified", FieldKind::Bool),
        Field::new("key", FieldKind::Pubkey),
    ];
    const USES_FIELDS: &[Field] = &[
        Field::new("use_method", FieldKind::U8),
        Field::new("remaining", FieldKind::U64),
        Field::new("total", FieldKind::U64),
    ];
    const COLLECTION_DETAILS_FIELDS: &[Field] = &[
        Field::new("variant", FieldKind::U8),
        Field::new("size", FieldKind::U64),
    ];

    pub const CREATE_METADATA_ACCOUNT_V3_ARGS: Layout = Layout {
        name: "create_metadata_account_v3",
        version: 3,
        discriminator: &[33],
        fields: &[
            Field::new("name", FieldKind::String),
            Field::new("symbol", FieldKind::String),
            Field::new("uri", FieldKind::String),
            Field::new("seller_fee_basis_points", FieldKind::U16),
            Field::new("creators", FieldKind::Option(&FieldKind::Vec(CREATOR_FIELDS))),
            Field::new("collection", FieldKind::Option(&FieldKind::Struct(COLLECTION_FIELDS))),
            Field::new("uses", FieldKind::Option(&FieldKind::Struct(USES_FIELDS))),
            Field::new("is_mutable", FieldKind::Bool),
            Field::new(
                "collection_details",
                FieldKind::Option(&FieldKind::Struct(COLLECTION_DETAILS_FIELDS)),
            ),
        ],
    };

    /// Plain fungible token metadata: no creators, collection or uses. The
    /// mint authority pays and stays update authority.
    pub fn create_metadata_account_v3(
        mint: &Pubkey,
        authority: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
    ) -> Result<Instruction, Error> {
        let metadata = crate::pda::metadata_key(mint)?;
        let data = CREATE_METADATA_ACCOUNT_V3_ARGS.encode(
            &Fields::new()
                .with("name", Value::Str(name.to_string()))
                .with("symbol", Value::Str(symbol.to_string()))
                .with("uri", Value::Str(uri.to_string()))
                .with("seller_fee_basis_points", Value::U16(0))
                .with("creators", Value::Option(None))
                .with("collection", Value::Option(None))
                .with("uses", Value::Option(None))
                .with("is_mutable", Value::Bool(true))
                .with("collection_details", Value::Option(None)),
        )?;
        Ok(Instruction {
            program_id: TOKEN_METADATA_PROGRAM_ID,
            accounts: vec![
                AccountMeta::new(metadata, false),
                AccountMeta::new_readonly(*mint, false),
                AccountMeta::new_readonly(*authority, true),
                AccountMeta::new(*authority, true),
                AccountMeta::new_readonly(*authority, true),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::hash::hash;

    use super::*;

    fn global(name: &str) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&hash(format!("global:{name}").as_bytes()).to_bytes()[..8]);
        out
    }

    #[test]
    fn discriminators_match_instruction_names() {
        assert_eq!(discriminator::LIST_NFT, global("list_nft"));
        assert_eq!(discriminator::BUY_NFT, global("buy_nft"));
        assert_eq!(discriminator::DELIST_NFT, global("delist_nft"));
        assert_eq!(discriminator::UPDATE_LISTING, global("update_listing"));
        assert_eq!(discriminator::MINT_NFT, global("mint_nft"));
        assert_eq!(discriminator::CREATE_COLLECTION, global("create_collection"));
        assert_eq!(discriminator::VERIFY_COLLECTION, global("verify_collection"));
        assert_eq!(
            discriminator::INITIALIZE_MARKETPLACE,
            global("initialize_marketplace")
        );
        assert_eq!(discriminator::PAUSE_MARKETPLACE, global("pause_marketplace"));
        assert_eq!(discriminator::UNPAUSE_MARKETPLACE, global("unpause_marketplace"));
    }

    #[test]
    fn list_data_is_discriminator_then_price_and_duration() {
        let accounts = accounts::ListNft {
            owner: Pubkey::new_unique(),
            listing: Pubkey::new_unique(),
            nft_mint: Pubkey::new_unique(),
            owner_token: Pubkey::new_unique(),
            escrow_token: Pubkey::new_unique(),
            config: Pubkey::new_unique(),
        };
        let ix = list_nft(Pubkey::new_unique(), accounts, 2_000_000_000, 604_800).unwrap();
        assert_eq!(&ix.data[..8], &discriminator::LIST_NFT);
        assert_eq!(&ix.data[8..16], &2_000_000_000u64.to_le_bytes());
        assert_eq!(&ix.data[16..24], &604_800i64.to_le_bytes());
        assert_eq!(ix.data.len(), 24);
        let keys: Vec<_> = ix.accounts.iter().map(|m| m.pubkey).collect();
        assert_eq!(
            &keys[..6],
            &[
                accounts.owner,
                accounts.listing,
                accounts.nft_mint,
                accounts.owner_token,
                accounts.escrow_token,
                accounts.config
            ]
        );
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[2].is_writable);
    }

    #[test]
    fn metadata_args_are_length_prefixed() {
        let creator = Pubkey::new_unique();
        let args = NftMetadataArgs {
            name: "Owl".to_string(),
            symbol: "OWL".to_string(),
            uri: "https://x.y/1.json".to_string(),
            seller_fee_basis_points: 500,
            creators: vec![Creator {
                address: creator,
                verified: false,
                share: 100,
            }],
        };
        let data = MINT_NFT_ARGS.encode(&args.to_fields()).unwrap();
        let mut expected = discriminator::MINT_NFT.to_vec();
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(b"Owl");
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(b"OWL");
        expected.extend_from_slice(&18u32.to_le_bytes());
        expected.extend_from_slice(b"https://x.y/1.json");
        expected.extend_from_slice(&500u16.to_le_bytes());
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(creator.as_ref());
        expected.extend_from_slice(&[0, 100]);
        assert_eq!(data, expected);
    }

    #[test]
    fn metadata_args_are_validated() {
        let mut args = NftMetadataArgs {
            name: "x".repeat(33),
            symbol: "OWL".to_string(),
            uri: String::new(),
            seller_fee_basis_points: 0,
            creators: vec![Creator {
                address: Pubkey::new_unique(),
                verified: false,
                share: 100,
            }],
        };
        assert!(matches!(args.validate(), Err(Error::InvalidMetadata(_))));
        args.name = "ok".to_string();
        assert!(args.validate().is_ok());
        args.creators[0].share = 99;
        assert!(matches!(args.validate(), Err(Error::InvalidMetadata(_))));
        args.creators.clear();
        assert!(matches!(args.validate(), Err(Error::InvalidMetadata(_))));
    }

    #[test]
    fn initialize_rejects_fee_over_full() {
        let accounts = accounts::InitializeMarketplace {
            authority: Pubkey::new_unique(),
            config: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
        };
        assert!(initialize_marketplace(Pubkey::new_unique(), accounts, 10_001).is_err());
        let ix = initialize_marketplace(Pubkey::new_unique(), accounts, 250).unwrap();
        assert_eq!(&ix.data[8..], &250u16.to_le_bytes());
    }

    #[test]
    fn spl_instruction_encodings() {
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ix = spl::initialize_mint(&mint, 0, &authority, Some(&authority));
        assert_eq!(ix.data.len(), 67);
        assert_eq!(ix.data[0..2], [0, 0]);
        assert_eq!(ix.data[34], 1);

        let ix = spl::initialize_mint(&mint, 9, &authority, None);
        assert_eq!(ix.data.len(), 35);

        let ix = spl::mint_to(&mint, &Pubkey::new_unique(), &authority, 42);
        assert_eq!(ix.data, [7, 42, 0, 0, 0, 0, 0, 0, 0]);

        let payer = Pubkey::new_unique();
        let ix = spl::create_associated_token_account(&payer, &authority, &mint, true).unwrap();
        assert_eq!(ix.data, vec![1]);
        assert_eq!(
            ix.accounts[1].pubkey,
            crate::pda::associated_token_key(&authority, &mint).unwrap()
        );
    }

    #[test]
    fn fungible_metadata_encoding() {
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ix = token_metadata::create_metadata_account_v3(&mint, &authority, "Coin", "CN", "u")
            .unwrap();
        let mut expected = vec![33];
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(b"Coin");
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"CN");
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.extend_from_slice(b"u");
        // fee, creators, collection, uses, mutable, collection details
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(ix.data, expected);
        assert_eq!(ix.accounts[0].pubkey, crate::pda::metadata_key(&mint).unwrap());
    }
}

//! User level flows. Each one reads whatever live state its preconditions
//! need, then returns the full ordered instruction set for a single atomic
//! transaction. Nothing is submitted until [`submit`] is called.

use market_transaction_utils::{
    priority_fee::{network_fee, with_compute_budget, DEFAULT_COMPUTE_UNIT_LIMIT},
    send_and_confirm, SendConfig,
};
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    system_instruction,
};
use tracing::{debug, info};

use crate::{
    accounts::{
        CollectibleMetadata, ListingRecord, MarketplaceConfig, TokenAccount, MAX_NAME_LENGTH,
        MAX_SYMBOL_LENGTH, MAX_URI_LENGTH, MINT_ACCOUNT_SIZE,
    },
    client::{ChainState, GetAccount, GetMarketAccount, MarketRpc},
    error::Error,
    fees::{compute_split, FeeSplit},
    instruction::{self, accounts, spl, token_metadata, NftMetadataArgs},
    pda::{self, MarketAddresses, TOKEN_PROGRAM_ID},
};

/// Size of an SPL token account
pub const TOKEN_ACCOUNT_SIZE: usize = 165;

/// Instructions for one transaction plus any keypairs that must co-sign with
/// the payer.
#[derive(Debug)]
pub struct InstructionBundle {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Keypair>,
    pub fee_split: Option<FeeSplit>,
}

impl InstructionBundle {
    fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            signers: vec![],
            fee_split: None,
        }
    }

    fn with_signer(mut self, signer: Keypair) -> Self {
        self.signers.push(signer);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub addresses: MarketAddresses,
    pub compute_unit_limit: u32,
    pub priority_fee: Option<u64>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            addresses: MarketAddresses::default(),
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            priority_fee: None,
        }
    }
}

impl FlowConfig {
    fn program_id(&self) -> Pubkey {
        self.addresses.program_id
    }

    fn budgeted(&self, instructions: Vec<Instruction>) -> Vec<Instruction> {
        with_compute_budget(instructions, self.compute_unit_limit, self.priority_fee)
    }

    fn network_fee(&self, instructions: &[Instruction], payer: &Pubkey) -> u64 {
        network_fee(
            instructions,
            payer,
            self.compute_unit_limit,
            self.priority_fee.unwrap_or_default(),
        )
    }
}

/// Signs with `payer` plus the bundle's own signers and waits for
/// confirmation.
pub async fn submit<C: MarketRpc + ?Sized>(
    client: &C,
    bundle: &InstructionBundle,
    payer: &dyn Signer,
    config: &SendConfig,
) -> Result<Signature, Error> {
    let signers: Vec<&dyn Signer> = std::iter::once(payer)
        .chain(bundle.signers.iter().map(|kp| kp as &dyn Signer))
        .collect();
    let signature = send_and_confirm(client, &bundle.instructions, &signers, config).await?;
    info!(%signature, "submitted");
    Ok(signature)
}

pub async fn load_config<C: GetAccount + Sync + ?Sized>(
    client: &C,
    flow: &FlowConfig,
) -> Result<Option<MarketplaceConfig>, Error> {
    let (config_key, _) = flow.addresses.config_key()?;
    client.market_account::<MarketplaceConfig>(&config_key).await
}

async fn require_config<C: GetAccount + Sync + ?Sized>(
    client: &C,
    flow: &FlowConfig,
) -> Result<MarketplaceConfig, Error> {
    let (config_key, _) = flow.addresses.config_key()?;
    client
        .market_account::<MarketplaceConfig>(&config_key)
        .await?
        .ok_or_else(|| Error::missing_account("marketplace config", &config_key))
}

async fn require_listing<C: GetAccount + Sync + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    mint: &Pubkey,
) -> Result<(Pubkey, ListingRecord), Error> {
    let (listing_key, _) = flow.addresses.listing_key(mint)?;
    let listing = client
        .market_account::<ListingRecord>(&listing_key)
        .await?
        .ok_or_else(|| Error::missing_account("listing", &listing_key))?;
    Ok((listing_key, listing))
}

/// Listing that `seller` can still change
fn check_seller_owns(listing: &ListingRecord, seller: &Pubkey) -> Result<(), Error> {
    if !listing.is_active {
        return Err(Error::stale("listing is no longer active"));
    }
    if listing.seller != *seller {
        return Err(Error::stale(format!(
            "listing belongs to {}, not {seller}",
            listing.seller
        )));
    }
    Ok(())
}

fn check_listing_terms(price: u64, duration: i64) -> Result<(), Error> {
    if price == 0 {
        return Err(Error::InvalidFeeParameters("price must be positive".to_string()));
    }
    if duration < 0 {
        return Err(Error::InvalidFeeParameters(format!(
            "duration {duration} is negative"
        )));
    }
    Ok(())
}

pub async fn list<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    owner: &Pubkey,
    mint: &Pubkey,
    price: u64,
    duration: i64,
) -> Result<InstructionBundle, Error> {
    check_listing_terms(price, duration)?;
    let (config_key, _) = flow.addresses.config_key()?;
    let config = require_config(client, flow).await?;
    if config.is_paused {
        return Err(Error::stale("marketplace is paused"));
    }

    let owner_token = pda::associated_token_key(owner, mint)?;
    let holding = client
        .market_account::<TokenAccount>(&owner_token)
        .await?
        .ok_or_else(|| Error::missing_account("owner token account", &owner_token))?;
    if holding.amount != 1 || holding.mint != *mint {
        return Err(Error::stale(format!(
            "{owner} does not hold {mint} in {owner_token}"
        )));
    }

    let (listing_key, _) = flow.addresses.listing_key(mint)?;
    if let Some(existing) = client.market_account::<ListingRecord>(&listing_key).await? {
        if existing.is_active {
            return Err(Error::stale(format!("{mint} is already listed")));
        }
    }

    let ix = instruction::list_nft(
        flow.program_id(),
        accounts::ListNft {
            owner: *owner,
            listing: listing_key,
            nft_mint: *mint,
            owner_token,
            escrow_token: flow.addresses.escrow_key(mint)?,
            config: config_key,
        },
        price,
        duration,
    )?;
    debug!(%mint, price, duration, "built list");
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

/// Live state a purchase is checked and assembled against
#[derive(Debug, Clone)]
pub struct BuyContext {
    pub buyer: Pubkey,
    pub listing_key: Pubkey,
    pub listing: ListingRecord,
    pub config: MarketplaceConfig,
    pub metadata: CollectibleMetadata,
    pub buyer_token_exists: bool,
    pub now: i64,
}

/// Orders the purchase: budget, buyer token account if missing, price to the
/// seller, marketplace fee, royalty, then the program call. Zero value
/// transfers are left out.
pub fn build_buy(flow: &FlowConfig, ctx: &BuyContext) -> Result<(Vec<Instruction>, FeeSplit), Error> {
    let listing = &ctx.listing;
    if !listing.is_purchasable(ctx.now) {
        return Err(Error::stale(if listing.is_active {
            "listing has expired"
        } else {
            "listing is no longer active"
        }));
    }
    if listing.seller == ctx.buyer {
        return Err(Error::stale("cannot buy your own listing"));
    }
    if ctx.config.is_paused {
        return Err(Error::stale("marketplace is paused"));
    }

    let fee_bps = ctx.config.fee_basis_points;
    let treasury = ctx.config.treasury_wallet;
    let (royalty_bps, creator) = match ctx.metadata.royalty_recipient() {
        Some(creator) => (ctx.metadata.seller_fee_basis_points, *creator),
        None => (0, ctx.buyer),
    };
    let split = compute_split(listing.price, fee_bps, royalty_bps)?;

    let mint = listing.nft_mint;
    let buyer_token = pda::associated_token_key(&ctx.buyer, &mint)?;
    let (config_key, _) = flow.addresses.config_key()?;

    let mut ixs = vec![];
    if !ctx.buyer_token_exists {
        ixs.push(spl::create_associated_token_account(
            &ctx.buyer, &ctx.buyer, &mint, true,
        )?);
    }
    ixs.push(system_instruction::transfer(
        &ctx.buyer,
        &listing.seller,
        split.price,
    ));
    if split.marketplace_fee > 0 {
        ixs.push(system_instruction::transfer(
            &ctx.buyer,
            &treasury,
            split.marketplace_fee,
        ));
    }
    if split.royalty > 0 {
        ixs.push(system_instruction::transfer(&ctx.buyer, &creator, split.royalty));
    }
    ixs.push(instruction::buy_nft(
        flow.program_id(),
        accounts::BuyNft {
            buyer: ctx.buyer,
            seller: listing.seller,
            config: config_key,
            listing: ctx.listing_key,
            nft_mint: mint,
            seller_token: listing.owner_token_account,
            escrow_token: listing.escrow_token_account,
            buyer_token,
            treasury,
            creator,
        },
    ));
    Ok((flow.budgeted(ixs), split))
}

pub async fn buy<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    buyer: &Pubkey,
    mint: &Pubkey,
) -> Result<InstructionBundle, Error> {
    let (listing_key, listing) = require_listing(client, flow, mint).await?;
    let metadata_key = pda::metadata_key(mint)?;
    let metadata = client
        .market_account::<CollectibleMetadata>(&metadata_key)
        .await?
        .ok_or_else(|| Error::missing_account("metadata", &metadata_key))?;
    let buyer_token = pda::associated_token_key(buyer, mint)?;
    let ctx = BuyContext {
        buyer: *buyer,
        listing_key,
        listing,
        config: require_config(client, flow).await?,
        metadata,
        buyer_token_exists: client.account(&buyer_token).await?.is_some(),
        now: client.unix_timestamp().await?,
    };
    let (instructions, split) = build_buy(flow, &ctx)?;

    let token_rent = if ctx.buyer_token_exists {
        0
    } else {
        client.rent_exempt_minimum(TOKEN_ACCOUNT_SIZE).await?
    };
    check_balance(
        client,
        buyer,
        split.total,
        flow.network_fee(&instructions, buyer) + token_rent,
    )
    .await?;

    debug!(%mint, ?split, "built buy");
    Ok(InstructionBundle {
        instructions,
        signers: vec![],
        fee_split: Some(split),
    })
}

/// Fails with `InsufficientFunds` unless `payer` can cover `amount` plus the
/// transaction's own costs.
pub async fn check_balance<C: ChainState + Sync + ?Sized>(
    client: &C,
    payer: &Pubkey,
    amount: u64,
    reserve: u64,
) -> Result<(), Error> {
    let required = amount.saturating_add(reserve);
    let available = client.balance(payer).await?;
    if available < required {
        return Err(Error::InsufficientFunds {
            required,
            available,
        });
    }
    Ok(())
}

pub async fn delist<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<InstructionBundle, Error> {
    let (listing_key, listing) = require_listing(client, flow, mint).await?;
    check_seller_owns(&listing, owner)?;
    let ix = instruction::delist_nft(
        flow.program_id(),
        accounts::DelistNft {
            owner: *owner,
            listing: listing_key,
            nft_mint: *mint,
            owner_token: pda::associated_token_key(owner, mint)?,
            escrow_token: listing.escrow_token_account,
        },
    );
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

pub async fn update_listing<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    seller: &Pubkey,
    mint: &Pubkey,
    price: u64,
    duration: i64,
) -> Result<InstructionBundle, Error> {
    check_listing_terms(price, duration)?;
    let (listing_key, listing) = require_listing(client, flow, mint).await?;
    check_seller_owns(&listing, seller)?;
    let ix = instruction::update_listing(
        flow.program_id(),
        accounts::UpdateListing {
            listing: listing_key,
            nft_mint: *mint,
            seller: *seller,
        },
        price,
        duration,
    )?;
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

/// Creates `mint` as a fresh zero decimal mint controlled by the program's
/// mint authority, then has the program mint it into `collection`.
pub async fn mint_nft<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    owner: &Pubkey,
    mint: Keypair,
    collection_mint: &Pubkey,
    metadata: &NftMetadataArgs,
) -> Result<InstructionBundle, Error> {
    metadata.validate()?;
    let mint_key = mint.pubkey();
    let (mint_authority, _) = flow.addresses.mint_authority_key()?;
    let rent = client.rent_exempt_minimum(MINT_ACCOUNT_SIZE).await?;
    let ixs = vec![
        system_instruction::create_account(
            owner,
            &mint_key,
            rent,
            MINT_ACCOUNT_SIZE as u64,
            &TOKEN_PROGRAM_ID,
        ),
        spl::initialize_mint(&mint_key, 0, &mint_authority, Some(&mint_authority)),
        spl::create_associated_token_account(owner, owner, &mint_key, false)?,
        instruction::mint_nft(
            flow.program_id(),
            accounts::MintNft {
                owner: *owner,
                mint: mint_key,
                mint_authority,
                metadata: pda::metadata_key(&mint_key)?,
                master_edition: pda::master_edition_key(&mint_key)?,
                destination: pda::associated_token_key(owner, &mint_key)?,
                collection_mint: *collection_mint,
                collection_metadata: pda::metadata_key(collection_mint)?,
                collection_master_edition: pda::master_edition_key(collection_mint)?,
            },
            metadata,
        )?,
    ];
    let instructions = flow.budgeted(ixs);
    check_balance(client, owner, rent, flow.network_fee(&instructions, owner)).await?;
    Ok(InstructionBundle::new(instructions).with_signer(mint))
}

pub fn create_collection(
    flow: &FlowConfig,
    user: &Pubkey,
    mint: Keypair,
    metadata: &NftMetadataArgs,
) -> Result<InstructionBundle, Error> {
    let mint_key = mint.pubkey();
    let (mint_authority, _) = flow.addresses.mint_authority_key()?;
    let ix = instruction::create_collection(
        flow.program_id(),
        accounts::CreateCollection {
            user: *user,
            mint: mint_key,
            mint_authority,
            metadata: pda::metadata_key(&mint_key)?,
            master_edition: pda::master_edition_key(&mint_key)?,
            destination: pda::associated_token_key(user, &mint_key)?,
        },
        metadata,
    )?;
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])).with_signer(mint))
}

pub fn verify_collection(
    flow: &FlowConfig,
    authority: &Pubkey,
    mint: &Pubkey,
    collection_mint: &Pubkey,
) -> Result<InstructionBundle, Error> {
    let (mint_authority, _) = flow.addresses.mint_authority_key()?;
    let ix = instruction::verify_collection(
        flow.program_id(),
        accounts::VerifyCollection {
            authority: *authority,
            metadata: pda::metadata_key(mint)?,
            mint: *mint,
            mint_authority,
            collection_mint: *collection_mint,
            collection_metadata: pda::metadata_key(collection_mint)?,
            collection_master_edition: pda::master_edition_key(collection_mint)?,
        },
    );
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

pub async fn initialize_marketplace<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    authority: &Pubkey,
    treasury: &Pubkey,
    fee_basis_points: u16,
) -> Result<InstructionBundle, Error> {
    let (config_key, _) = flow.addresses.config_key()?;
    if client.account(&config_key).await?.is_some() {
        return Err(Error::stale(format!(
            "marketplace config {config_key} already exists"
        )));
    }
    let ix = instruction::initialize_marketplace(
        flow.program_id(),
        accounts::InitializeMarketplace {
            authority: *authority,
            config: config_key,
            treasury: *treasury,
        },
        fee_basis_points,
    )?;
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

pub async fn set_paused<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    authority: &Pubkey,
    paused: bool,
) -> Result<InstructionBundle, Error> {
    let (config_key, _) = flow.addresses.config_key()?;
    let config = require_config(client, flow).await?;
    if config.authority != *authority {
        return Err(Error::stale(format!(
            "{authority} is not the marketplace authority"
        )));
    }
    if config.is_paused == paused {
        return Err(Error::stale(if paused {
            "marketplace is already paused"
        } else {
            "marketplace is not paused"
        }));
    }
    let ix = instruction::set_paused(
        flow.program_id(),
        accounts::SetPaused {
            config: config_key,
            authority: *authority,
        },
        paused,
    );
    Ok(InstructionBundle::new(flow.budgeted(vec![ix])))
}

/// Fungible token to create with [`create_token`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub decimals: u8,
    /// Whole tokens, scaled by `decimals` when minted
    pub amount: u64,
}

impl TokenSpec {
    pub fn base_units(&self) -> Result<u64, Error> {
        10u64
            .checked_pow(self.decimals as u32)
            .and_then(|scale| self.amount.checked_mul(scale))
            .ok_or(Error::InvalidTokenAmount)
    }

    /// The metadata program enforces the same limits as for NFTs
    pub fn validate(&self) -> Result<(), Error> {
        for (field, len, max) in [
            ("name", self.name.len(), MAX_NAME_LENGTH),
            ("symbol", self.symbol.len(), MAX_SYMBOL_LENGTH),
            ("uri", self.uri.len(), MAX_URI_LENGTH),
        ] {
            if len > max {
                return Err(Error::InvalidMetadata(format!(
                    "{field} is {len} bytes, limit is {max}"
                )));
            }
        }
        Ok(())
    }
}

pub async fn create_token<C: MarketRpc + ?Sized>(
    client: &C,
    flow: &FlowConfig,
    payer: &Pubkey,
    mint: Keypair,
    token: &TokenSpec,
) -> Result<InstructionBundle, Error> {
    token.validate()?;
    let base_units = token.base_units()?;
    let mint_key = mint.pubkey();
    let ata = pda::associated_token_key(payer, &mint_key)?;
    let rent = client.rent_exempt_minimum(MINT_ACCOUNT_SIZE).await?;
    let ixs = vec![
        system_instruction::create_account(
            payer,
            &mint_key,
            rent,
            MINT_ACCOUNT_SIZE as u64,
            &TOKEN_PROGRAM_ID,
        ),
        spl::initialize_mint(&mint_key, token.decimals, payer, Some(payer)),
        spl::create_associated_token_account(payer, payer, &mint_key, false)?,
        spl::mint_to(&mint_key, &ata, payer, base_units),
        token_metadata::create_metadata_account_v3(
            &mint_key,
            payer,
            &token.name,
            &token.symbol,
            &token.uri,
        )?,
    ];
    Ok(InstructionBundle::new(flow.budgeted(ixs)).with_signer(mint))
}

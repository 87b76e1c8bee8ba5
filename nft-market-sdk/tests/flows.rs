mod common;

use common::*;
use market_transaction_utils::{RetryPolicy, SendConfig};
use nft_market_sdk::{
    instruction::{discriminator, NftMetadataArgs},
    market::{self, FlowConfig, TokenSpec},
    pda::{self, MarketAddresses, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID},
    Error,
};
use solana_sdk::{
    compute_budget, pubkey::Pubkey, signature::Keypair, signer::Signer, system_program,
};

fn flow() -> FlowConfig {
    FlowConfig::default()
}

fn addresses() -> MarketAddresses {
    flow().addresses
}

struct BuySetup {
    chain: MockChain,
    buyer: Pubkey,
    seller: Pubkey,
    mint: Pubkey,
    creator: Pubkey,
}

fn buy_setup(price: u64, fee_bps: u16, royalty_bps: u16) -> BuySetup {
    let chain = MockChain::default();
    let (buyer, seller, mint, creator) = (
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
    );
    chain.put_config(&addresses(), &config(Pubkey::new_unique(), fee_bps));
    chain.put_canonical_listing(&addresses(), &listing(&addresses(), seller, mint, price, None));
    chain.put_metadata(&metadata(mint, vec![common::creator(creator)], royalty_bps));
    BuySetup {
        chain,
        buyer,
        seller,
        mint,
        creator,
    }
}

#[tokio::test]
async fn buy_with_zero_royalty_omits_the_transfer() {
    let setup = buy_setup(10_000_000, 200, 0);
    setup.chain.fund(&setup.buyer, 1_000_000_000);
    let bundle = market::buy(&setup.chain, &flow(), &setup.buyer, &setup.mint)
        .await
        .unwrap();

    let split = bundle.fee_split.unwrap();
    assert_eq!(split.marketplace_fee, 200_000);
    assert_eq!(split.royalty, 0);
    assert_eq!(split.total, 10_200_000);

    let programs: Vec<_> = bundle.instructions.iter().map(|ix| ix.program_id).collect();
    assert_eq!(
        programs,
        vec![
            compute_budget::id(),
            ASSOCIATED_TOKEN_PROGRAM_ID,
            system_program::ID,
            system_program::ID,
            addresses().program_id,
        ]
    );
    let buy = bundle.instructions.last().unwrap();
    assert_eq!(buy.data, discriminator::BUY_NFT.to_vec());
    assert_eq!(buy.accounts.len(), 14);
    assert_eq!(buy.accounts[0].pubkey, setup.buyer);
    assert_eq!(buy.accounts[1].pubkey, setup.seller);
    assert_eq!(buy.accounts[4].pubkey, setup.mint);
    assert_eq!(buy.accounts[9].pubkey, setup.creator);
}

#[tokio::test]
async fn buy_pays_royalty_to_first_creator() {
    let setup = buy_setup(10_000_000, 200, 500);
    setup.chain.fund(&setup.buyer, 1_000_000_000);
    setup
        .chain
        .put_token_account(&setup.buyer, &setup.mint, 0);
    let bundle = market::buy(&setup.chain, &flow(), &setup.buyer, &setup.mint)
        .await
        .unwrap();
    assert_eq!(bundle.fee_split.unwrap().total, 10_700_000);
    // buyer token account exists, so no creation instruction
    assert!(bundle
        .instructions
        .iter()
        .all(|ix| ix.program_id != ASSOCIATED_TOKEN_PROGRAM_ID));
    let royalty = &bundle.instructions[3];
    assert_eq!(royalty.accounts[1].pubkey, setup.creator);
}

#[tokio::test]
async fn buy_checks_balance_before_submission() {
    let setup = buy_setup(10_000_000, 200, 500);
    setup.chain.fund(&setup.buyer, 10_700_000);
    match market::buy(&setup.chain, &flow(), &setup.buyer, &setup.mint).await {
        Err(Error::InsufficientFunds {
            required,
            available,
        }) => {
            assert_eq!(available, 10_700_000);
            // total, one signature and rent for the new token account
            assert_eq!(required, 10_700_000 + 5_000 + (165 + 128) * 6_960);
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
    assert_eq!(setup.chain.sent_count(), 0);
}

#[tokio::test]
async fn buy_refuses_expired_and_own_listings() {
    let setup = buy_setup(10_000_000, 200, 0);
    setup.chain.fund(&setup.buyer, u64::MAX / 2);
    setup.chain.fund(&setup.seller, u64::MAX / 2);
    assert!(matches!(
        market::buy(&setup.chain, &flow(), &setup.seller, &setup.mint).await,
        Err(Error::StaleAccountState(_))
    ));

    let expired = listing(
        &addresses(),
        setup.seller,
        setup.mint,
        10_000_000,
        Some(NOW - 1),
    );
    setup.chain.put_canonical_listing(&addresses(), &expired);
    assert!(matches!(
        market::buy(&setup.chain, &flow(), &setup.buyer, &setup.mint).await,
        Err(Error::StaleAccountState(_))
    ));
}

#[tokio::test]
async fn buy_without_listing_is_missing_account() {
    let chain = MockChain::default();
    assert!(matches!(
        market::buy(&chain, &flow(), &Pubkey::new_unique(), &Pubkey::new_unique()).await,
        Err(Error::MissingRequiredAccount(_))
    ));
}

#[tokio::test]
async fn buy_without_marketplace_config_is_missing_account() {
    let setup = buy_setup(10_000_000, 200, 0);
    setup.chain.fund(&setup.buyer, 1_000_000_000);
    setup
        .chain
        .remove_account(&addresses().config_key().unwrap().0);
    match market::buy(&setup.chain, &flow(), &setup.buyer, &setup.mint).await {
        Err(Error::MissingRequiredAccount(account)) => {
            assert!(account.contains("marketplace config"))
        }
        other => panic!("expected missing config, got {other:?}"),
    }
    assert_eq!(setup.chain.sent_count(), 0);
}

#[tokio::test]
async fn list_orders_keys_and_checks_custody() {
    let chain = MockChain::default();
    let (owner, mint) = (Pubkey::new_unique(), Pubkey::new_unique());
    let config_key = chain.put_config(&addresses(), &config(Pubkey::new_unique(), 250));

    assert!(matches!(
        market::list(&chain, &flow(), &owner, &mint, 5, 0).await,
        Err(Error::MissingRequiredAccount(_))
    ));
    chain.put_token_account(&owner, &mint, 0);
    assert!(matches!(
        market::list(&chain, &flow(), &owner, &mint, 5, 0).await,
        Err(Error::StaleAccountState(_))
    ));

    let owner_token = chain.put_token_account(&owner, &mint, 1);
    let bundle = market::list(&chain, &flow(), &owner, &mint, 2_000_000_000, 86_400)
        .await
        .unwrap();
    assert_eq!(bundle.instructions[0].program_id, compute_budget::id());
    let ix = bundle.instructions.last().unwrap();
    let keys: Vec<_> = ix.accounts.iter().map(|meta| meta.pubkey).collect();
    assert_eq!(
        keys,
        vec![
            owner,
            addresses().listing_key(&mint).unwrap().0,
            mint,
            owner_token,
            addresses().escrow_key(&mint).unwrap(),
            config_key,
            TOKEN_PROGRAM_ID,
            system_program::ID,
            ASSOCIATED_TOKEN_PROGRAM_ID,
            solana_sdk::sysvar::rent::ID,
        ]
    );
    assert_eq!(&ix.data[..8], &discriminator::LIST_NFT);
    assert_eq!(&ix.data[8..16], &2_000_000_000u64.to_le_bytes());
    assert_eq!(&ix.data[16..], &86_400i64.to_le_bytes());
}

#[tokio::test]
async fn list_refuses_paused_marketplace_and_relisting() {
    let chain = MockChain::default();
    let (owner, mint) = (Pubkey::new_unique(), Pubkey::new_unique());
    chain.put_token_account(&owner, &mint, 1);
    let mut paused = config(Pubkey::new_unique(), 250);
    paused.is_paused = true;
    chain.put_config(&addresses(), &paused);
    assert!(matches!(
        market::list(&chain, &flow(), &owner, &mint, 5, 0).await,
        Err(Error::StaleAccountState(_))
    ));

    chain.put_config(&addresses(), &config(Pubkey::new_unique(), 250));
    chain.put_canonical_listing(&addresses(), &listing(&addresses(), owner, mint, 5, None));
    assert!(matches!(
        market::list(&chain, &flow(), &owner, &mint, 5, 0).await,
        Err(Error::StaleAccountState(_))
    ));
    assert!(matches!(
        market::list(&chain, &flow(), &owner, &mint, 0, 0).await,
        Err(Error::InvalidFeeParameters(_))
    ));
}

#[tokio::test]
async fn delist_and_update_require_the_seller() {
    let chain = MockChain::default();
    let (seller, mint) = (Pubkey::new_unique(), Pubkey::new_unique());
    let listing_key =
        chain.put_canonical_listing(&addresses(), &listing(&addresses(), seller, mint, 9, None));

    let stranger = Pubkey::new_unique();
    assert!(matches!(
        market::delist(&chain, &flow(), &stranger, &mint).await,
        Err(Error::StaleAccountState(_))
    ));
    assert!(matches!(
        market::update_listing(&chain, &flow(), &stranger, &mint, 10, 0).await,
        Err(Error::StaleAccountState(_))
    ));

    let bundle = market::delist(&chain, &flow(), &seller, &mint).await.unwrap();
    let ix = bundle.instructions.last().unwrap();
    assert_eq!(ix.data, discriminator::DELIST_NFT.to_vec());
    assert_eq!(ix.accounts[1].pubkey, listing_key);
    assert_eq!(
        ix.accounts[3].pubkey,
        pda::associated_token_key(&seller, &mint).unwrap()
    );
    assert_eq!(ix.accounts[4].pubkey, addresses().escrow_key(&mint).unwrap());

    let bundle = market::update_listing(&chain, &flow(), &seller, &mint, 10, 60)
        .await
        .unwrap();
    let ix = bundle.instructions.last().unwrap();
    assert_eq!(ix.accounts[2].pubkey, seller);
    assert!(ix.accounts[2].is_signer);
    assert_eq!(&ix.data[8..16], &10u64.to_le_bytes());
}

fn nft_args(creator: Pubkey) -> NftMetadataArgs {
    NftMetadataArgs {
        name: "Night Owl #1".to_string(),
        symbol: "OWL".to_string(),
        uri: "https://meta.example/1.json".to_string(),
        seller_fee_basis_points: 500,
        creators: vec![common::creator(creator)],
    }
}

#[tokio::test]
async fn mint_creates_account_before_using_it() {
    let chain = MockChain::default();
    let owner = Keypair::new();
    chain.fund(&owner.pubkey(), 1_000_000_000);
    let mint = Keypair::new();
    let mint_key = mint.pubkey();
    let collection = Pubkey::new_unique();
    let bundle = market::mint_nft(
        &chain,
        &flow(),
        &owner.pubkey(),
        mint,
        &collection,
        &nft_args(owner.pubkey()),
    )
    .await
    .unwrap();

    let programs: Vec<_> = bundle.instructions.iter().map(|ix| ix.program_id).collect();
    assert_eq!(
        programs,
        vec![
            compute_budget::id(),
            system_program::ID,
            TOKEN_PROGRAM_ID,
            ASSOCIATED_TOKEN_PROGRAM_ID,
            addresses().program_id,
        ]
    );
    let (authority, _) = addresses().mint_authority_key().unwrap();
    let init = &bundle.instructions[2];
    assert_eq!(init.data[1], 0);
    assert_eq!(&init.data[2..34], authority.as_ref());
    let mint_ix = bundle.instructions.last().unwrap();
    assert_eq!(mint_ix.accounts[1].pubkey, mint_key);
    assert_eq!(mint_ix.accounts[2].pubkey, authority);
    assert!(mint_ix.accounts[2].is_writable && !mint_ix.accounts[2].is_signer);
    assert_eq!(
        mint_ix.accounts[7].pubkey,
        pda::metadata_key(&collection).unwrap()
    );
    assert_eq!(bundle.signers[0].pubkey(), mint_key);

    market::submit(&chain, &bundle, &owner, &fast_send())
        .await
        .unwrap();
    let sent = chain.sent.lock().unwrap();
    assert_eq!(sent[0].signatures.len(), 2);
}

#[tokio::test]
async fn mint_rejects_bad_creator_shares() {
    let chain = MockChain::default();
    let owner = Pubkey::new_unique();
    chain.fund(&owner, 1_000_000_000);
    let mut args = nft_args(owner);
    args.creators[0].share = 50;
    assert!(matches!(
        market::mint_nft(&chain, &flow(), &owner, Keypair::new(), &Pubkey::new_unique(), &args)
            .await,
        Err(Error::InvalidMetadata(_))
    ));
}

#[tokio::test]
async fn marketplace_admin_flows() {
    let chain = MockChain::default();
    let authority = Pubkey::new_unique();
    let treasury = Pubkey::new_unique();

    let bundle = market::initialize_marketplace(&chain, &flow(), &authority, &treasury, 250)
        .await
        .unwrap();
    let ix = bundle.instructions.last().unwrap();
    assert_eq!(ix.accounts[1].pubkey, addresses().config_key().unwrap().0);
    assert_eq!(ix.accounts[2].pubkey, treasury);

    let mut existing = config(authority, 250);
    existing.treasury_wallet = treasury;
    chain.put_config(&addresses(), &existing);
    assert!(matches!(
        market::initialize_marketplace(&chain, &flow(), &authority, &treasury, 250).await,
        Err(Error::StaleAccountState(_))
    ));

    let bundle = market::set_paused(&chain, &flow(), &authority, true)
        .await
        .unwrap();
    assert_eq!(
        bundle.instructions.last().unwrap().data,
        discriminator::PAUSE_MARKETPLACE.to_vec()
    );
    assert!(matches!(
        market::set_paused(&chain, &flow(), &Pubkey::new_unique(), true).await,
        Err(Error::StaleAccountState(_))
    ));
    assert!(matches!(
        market::set_paused(&chain, &flow(), &authority, false).await,
        Err(Error::StaleAccountState(_))
    ));
}

#[tokio::test]
async fn create_token_mints_scaled_supply() {
    let chain = MockChain::default();
    let payer = Keypair::new();
    let mint = Keypair::new();
    let mint_key = mint.pubkey();
    let spec = TokenSpec {
        name: "Coin".to_string(),
        symbol: "CN".to_string(),
        uri: "https://meta.example/coin.json".to_string(),
        decimals: 6,
        amount: 1_000,
    };
    let bundle = market::create_token(&chain, &flow(), &payer.pubkey(), mint, &spec)
        .await
        .unwrap();
    let mint_to = &bundle.instructions[4];
    assert_eq!(mint_to.program_id, TOKEN_PROGRAM_ID);
    assert_eq!(mint_to.data[0], 7);
    assert_eq!(&mint_to.data[1..], &1_000_000_000u64.to_le_bytes());
    assert_eq!(
        bundle.instructions[5].accounts[0].pubkey,
        pda::metadata_key(&mint_key).unwrap()
    );

    market::submit(&chain, &bundle, &payer, &fast_send())
        .await
        .unwrap();
    assert_eq!(chain.sent_count(), 1);
}

fn fast_send() -> SendConfig {
    SendConfig {
        retry: RetryPolicy::none(),
        confirmation_check_interval: std::time::Duration::from_millis(1),
    }
}

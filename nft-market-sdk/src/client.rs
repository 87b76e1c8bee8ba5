use std::sync::Arc;

use futures::{stream, StreamExt, TryFutureExt, TryStreamExt};
use itertools::Itertools;
use market_transaction_utils::sender::{BlockHashData, SendTransaction, SignatureStatus};
use solana_account_decoder::UiAccountEncoding;
pub use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::{
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    account::Account, clock::Clock, pubkey::Pubkey, signature::Signature, sysvar,
    transaction::VersionedTransaction,
};

use crate::{accounts::AccountLayout, error::Error, pda::MarketAddresses};

#[derive(Clone)]
pub struct MarketClient {
    pub solana_client: Arc<SolanaRpcClient>,
    pub addresses: MarketAddresses,
}

impl MarketClient {
    pub fn new(solana_client: Arc<SolanaRpcClient>, addresses: MarketAddresses) -> Self {
        Self {
            solana_client,
            addresses,
        }
    }
}

impl AsRef<SolanaRpcClient> for MarketClient {
    fn as_ref(&self) -> &SolanaRpcClient {
        &self.solana_client
    }
}

#[async_trait::async_trait]
pub trait GetAccount {
    async fn account(&self, pubkey: &Pubkey) -> Result<Option<Account>, Error>;
    async fn accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<(Pubkey, Option<Account>)>, Error>;
}

/// Reads accounts and decodes them with their layout. A present account that
/// does not decode is an error, a missing one is `None`.
#[async_trait::async_trait]
pub trait GetMarketAccount: GetAccount {
    async fn market_account<T: AccountLayout + Send>(
        &self,
        pubkey: &Pubkey,
    ) -> Result<Option<T>, Error>;
    async fn market_accounts<T: AccountLayout + Send>(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<(Pubkey, Option<T>)>, Error>;
}

#[async_trait::async_trait]
impl<C: GetAccount + Sync + ?Sized> GetMarketAccount for C {
    async fn market_account<T: AccountLayout + Send>(
        &self,
        pubkey: &Pubkey,
    ) -> Result<Option<T>, Error> {
        self.account(pubkey)
            .and_then(|maybe_account| async move {
                maybe_account
                    .map(|account| T::decode(&account.data).map_err(Error::from))
                    .transpose()
            })
            .await
    }

    async fn market_accounts<T: AccountLayout + Send>(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<(Pubkey, Option<T>)>, Error> {
        self.accounts(pubkeys)
            .await?
            .into_iter()
            .map(|(pubkey, maybe_account)| {
                maybe_account
                    .map(|account| T::decode(&account.data).map_err(Error::from))
                    .transpose()
                    .map(|decoded| (pubkey, decoded))
            })
            .try_collect()
    }
}

/// Server side filters for a program account scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    DataSize(u64),
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl ScanFilter {
    pub fn memcmp(offset: usize, bytes: impl AsRef<[u8]>) -> Self {
        Self::Memcmp {
            offset,
            bytes: bytes.as_ref().to_vec(),
        }
    }

    /// Whether `data` passes this filter
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::DataSize(size) => data.len() as u64 == *size,
            Self::Memcmp { offset, bytes } => data
                .get(*offset..offset + bytes.len())
                .is_some_and(|window| window == bytes.as_slice()),
        }
    }
}

impl From<ScanFilter> for RpcFilterType {
    fn from(value: ScanFilter) -> Self {
        match value {
            ScanFilter::DataSize(size) => RpcFilterType::DataSize(size),
            ScanFilter::Memcmp { offset, bytes } => {
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(offset, bytes))
            }
        }
    }
}

#[async_trait::async_trait]
pub trait ScanProgramAccounts {
    async fn scan(
        &self,
        program_id: &Pubkey,
        filters: Vec<ScanFilter>,
    ) -> Result<Vec<(Pubkey, Account)>, Error>;
}

/// Balance, rent and clock reads
#[async_trait::async_trait]
pub trait ChainState {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, Error>;
    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, Error>;
    /// Cluster time from the clock sysvar
    async fn unix_timestamp(&self) -> Result<i64, Error>;
}

/// Everything a marketplace flow needs from the cluster
pub trait MarketRpc:
    GetAccount + ScanProgramAccounts + ChainState + SendTransaction + Send + Sync
{
}

impl<T> MarketRpc for T where
    T: GetAccount + ScanProgramAccounts + ChainState + SendTransaction + Send + Sync + ?Sized
{
}

#[async_trait::async_trait]
impl GetAccount for SolanaRpcClient {
    async fn account(&self, pubkey: &Pubkey) -> Result<Option<Account>, Error> {
        self.get_account_with_commitment(pubkey, self.commitment())
            .map_ok(|response| response.value)
            .map_err(Error::from)
            .await
    }

    async fn accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<(Pubkey, Option<Account>)>, Error> {
        async fn get_accounts(
            client: &SolanaRpcClient,
            pubkeys: &[Pubkey],
        ) -> Result<Vec<(Pubkey, Option<Account>)>, Error> {
            let accounts = client.get_multiple_accounts(pubkeys).await?;
            Ok(pubkeys.iter().cloned().zip(accounts).collect_vec())
        }

        stream::iter(pubkeys.to_vec())
            .chunks(100)
            .map(|key_chunk| async move { get_accounts(self, &key_chunk).await })
            .buffered(5)
            .try_concat()
            .await
    }
}

#[async_trait::async_trait]
impl ScanProgramAccounts for SolanaRpcClient {
    async fn scan(
        &self,
        program_id: &Pubkey,
        filters: Vec<ScanFilter>,
    ) -> Result<Vec<(Pubkey, Account)>, Error> {
        let config = RpcProgramAccountsConfig {
            filters: Some(filters.into_iter().map(RpcFilterType::from).collect()),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                commitment: Some(self.commitment()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.get_program_accounts_with_config(program_id, config)
            .map_err(Error::from)
            .await
    }
}

#[async_trait::async_trait]
impl ChainState for SolanaRpcClient {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, Error> {
        self.get_balance(pubkey).map_err(Error::from).await
    }

    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, Error> {
        self.get_minimum_balance_for_rent_exemption(data_len)
            .map_err(Error::from)
            .await
    }

    async fn unix_timestamp(&self) -> Result<i64, Error> {
        let account = self
            .account(&sysvar::clock::ID)
            .await?
            .ok_or_else(|| Error::missing_account("clock sysvar", &sysvar::clock::ID))?;
        bincode::deserialize::<Clock>(&account.data)
            .map(|clock| clock.unix_timestamp)
            .map_err(|err| Error::stale(format!("clock sysvar: {err}")))
    }
}

#[async_trait::async_trait]
impl GetAccount for MarketClient {
    async fn account(&self, pubkey: &Pubkey) -> Result<Option<Account>, Error> {
        self.solana_client.account(pubkey).await
    }

    async fn accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<(Pubkey, Option<Account>)>, Error> {
        self.solana_client.accounts(pubkeys).await
    }
}

#[async_trait::async_trait]
impl ScanProgramAccounts for MarketClient {
    async fn scan(
        &self,
        program_id: &Pubkey,
        filters: Vec<ScanFilter>,
    ) -> Result<Vec<(Pubkey, Account)>, Error> {
        self.solana_client.scan(program_id, filters).await
    }
}

#[async_trait::async_trait]
impl ChainState for MarketClient {
    async fn balance(&self, pubkey: &Pubkey) -> Result<u64, Error> {
        self.solana_client.balance(pubkey).await
    }

    async fn rent_exempt_minimum(&self, data_len: usize) -> Result<u64, Error> {
        self.solana_client.rent_exempt_minimum(data_len).await
    }

    async fn unix_timestamp(&self) -> Result<i64, Error> {
        self.solana_client.unix_timestamp().await
    }
}

#[async_trait::async_trait]
impl SendTransaction for MarketClient {
    async fn latest_blockhash(&self) -> Result<BlockHashData, market_transaction_utils::Error> {
        self.solana_client.latest_blockhash().await
    }

    async fn block_height(&self) -> Result<u64, market_transaction_utils::Error> {
        self.solana_client.block_height().await
    }

    async fn send(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<Signature, market_transaction_utils::Error> {
        // RpcClient has an inherent `send` for raw requests
        SendTransaction::send(self.solana_client.as_ref(), tx).await
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, market_transaction_utils::Error> {
        self.solana_client.signature_status(signature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memcmp_filter_matches_window() {
        let filter = ScanFilter::memcmp(2, [7, 8]);
        assert!(filter.matches(&[0, 0, 7, 8, 9]));
        assert!(!filter.matches(&[0, 0, 7, 9]));
        assert!(!filter.matches(&[0, 0, 7]));
        assert!(ScanFilter::DataSize(3).matches(&[1, 2, 3]));
        assert!(!ScanFilter::DataSize(3).matches(&[1, 2]));
    }
}

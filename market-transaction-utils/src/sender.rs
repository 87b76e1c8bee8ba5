use std::time::Duration;

use futures::TryFutureExt;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    signature::Signature,
    signer::Signer,
    transaction::{TransactionError, VersionedTransaction},
};
use tracing::{debug, info, warn};

use crate::{error::Error, pack, retry::RetryPolicy};

const CONFIRMATION_CHECK_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHashData {
    pub last_valid_block_height: u64,
    pub last_valid_blockhash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub err: Option<TransactionError>,
    /// Whether the status satisfies the client's commitment level
    pub confirmed: bool,
}

/// The write half of the RPC surface
#[async_trait::async_trait]
pub trait SendTransaction {
    async fn latest_blockhash(&self) -> Result<BlockHashData, Error>;
    async fn block_height(&self) -> Result<u64, Error>;
    async fn send(&self, tx: &VersionedTransaction) -> Result<Signature, Error>;
    async fn signature_status(&self, signature: &Signature)
        -> Result<Option<SignatureStatus>, Error>;
}

#[async_trait::async_trait]
impl SendTransaction for RpcClient {
    async fn latest_blockhash(&self) -> Result<BlockHashData, Error> {
        self.get_latest_blockhash_with_commitment(self.commitment())
            .map_ok(|(last_valid_blockhash, last_valid_block_height)| BlockHashData {
                last_valid_block_height,
                last_valid_blockhash,
            })
            .map_err(Error::from)
            .await
    }

    async fn block_height(&self) -> Result<u64, Error> {
        self.get_block_height().map_err(Error::from).await
    }

    async fn send(&self, tx: &VersionedTransaction) -> Result<Signature, Error> {
        self.send_transaction(tx).map_err(Error::from).await
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, Error> {
        let commitment = self.commitment();
        let response = self.get_signature_statuses(&[*signature]).await?;
        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatus {
                confirmed: status.satisfies_commitment(commitment),
                err: status.err,
            }))
    }
}

#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Applied to building and sending only. A confirmation timeout is never
    /// retried here since the payload has already been accepted.
    pub retry: RetryPolicy,
    pub confirmation_check_interval: Duration,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            confirmation_check_interval: CONFIRMATION_CHECK_INTERVAL,
        }
    }
}

struct SentTransaction {
    signature: Signature,
    last_valid_block_height: u64,
}

/// Signs `instructions` as one atomic transaction, submits it and waits for
/// the signature to reach the client's commitment. The first signer pays.
///
/// Network failures while sending re-fetch a blockhash and re-sign before the
/// next attempt, so the same signed bytes are never resubmitted.
pub async fn send_and_confirm<C: SendTransaction + ?Sized>(
    client: &C,
    instructions: &[Instruction],
    signers: &[&dyn Signer],
    config: &SendConfig,
) -> Result<Signature, Error> {
    let sent = config
        .retry
        .retry(
            |attempt| async move {
                let blockhash = client.latest_blockhash().await?;
                let tx = pack::mk_transaction(
                    instructions,
                    signers,
                    blockhash.last_valid_blockhash,
                )?;
                pack::ensure_fits(&tx)?;
                let signature = client.send(&tx).await?;
                debug!(%signature, attempt, "transaction sent");
                Ok::<_, Error>(SentTransaction {
                    signature,
                    last_valid_block_height: blockhash.last_valid_block_height,
                })
            },
            |err: &Error| matches!(err, Error::NetworkUnavailable(_)),
        )
        .await?;
    confirm(
        client,
        sent.signature,
        sent.last_valid_block_height,
        config.confirmation_check_interval,
    )
    .await
}

/// Polls whose RPC calls fail back to back before confirmation gives up
/// with the last network error. The transaction may still land.
pub const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 30;

pub async fn confirm<C: SendTransaction + ?Sized>(
    client: &C,
    signature: Signature,
    last_valid_block_height: u64,
    interval: Duration,
) -> Result<Signature, Error> {
    let mut check_interval = tokio::time::interval(interval);
    let mut failed_polls = 0;
    loop {
        check_interval.tick().await;
        let mut poll_error = None;
        match client.signature_status(&signature).await {
            Ok(Some(SignatureStatus { err: Some(err), .. })) => {
                return Err(Error::rejected(signature, err))
            }
            Ok(Some(SignatureStatus {
                confirmed: true, ..
            })) => {
                info!(%signature, "transaction confirmed");
                return Ok(signature);
            }
            Ok(_) => (),
            Err(err) => {
                warn!(?err, %signature, "checking signature status");
                poll_error = Some(err);
            }
        }
        match client.block_height().await {
            Ok(height) if height > last_valid_block_height => {
                return Err(Error::ConfirmationTimeout {
                    signature,
                    last_valid_block_height,
                })
            }
            Ok(_) => (),
            Err(err) => {
                warn!(?err, "fetching block height");
                poll_error = Some(err);
            }
        }
        match poll_error {
            Some(err) => {
                failed_polls += 1;
                if failed_polls >= MAX_CONSECUTIVE_POLL_FAILURES {
                    warn!(%signature, failed_polls, "rpc unreachable, giving up on confirmation");
                    return Err(err);
                }
            }
            None => failed_polls = 0,
        }
    }
}

use solana_client::client_error::reqwest;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::TransactionError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{layout} buffer truncated: need {needed} bytes, have {actual}")]
    Truncated {
        layout: &'static str,
        needed: usize,
        actual: usize,
    },
    #[error("{layout} discriminator mismatch: found {actual:?}")]
    DiscriminatorMismatch {
        layout: &'static str,
        actual: Vec<u8>,
    },
    #[error("field {field} is not valid utf-8")]
    InvalidUtf8 { field: &'static str },
    #[error("field {field} is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl DecodeError {
    pub fn invalid<S: ToString>(field: &'static str, reason: S) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid fee parameters: {0}")]
    InvalidFeeParameters(String),
    #[error("no bump produced an off-curve address")]
    AddressDerivationExhausted,
    #[error("missing required account: {0}")]
    MissingRequiredAccount(String),
    #[error("stale account state: {0}")]
    StaleAccountState(String),
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("transaction {signature} not confirmed before block height {last_valid_block_height}")]
    ConfirmationTimeout {
        signature: Signature,
        last_valid_block_height: u64,
    },
    #[error("insufficient funds: {required} lamports required, {available} available")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("transaction {signature} rejected (program error {code:?}): {error}")]
    TransactionRejected {
        signature: Signature,
        error: TransactionError,
        code: Option<u32>,
    },
    #[error("metadata unavailable at {uri}: {reason}")]
    MetadataUnavailable { uri: String, reason: String },
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("invalid token amount")]
    InvalidTokenAmount,
    #[error("transaction error: {0}")]
    Transaction(market_transaction_utils::Error),
    #[error("cache store error: {0}")]
    CacheStore(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<solana_client::client_error::ClientError> for Error {
    fn from(value: solana_client::client_error::ClientError) -> Self {
        Self::NetworkUnavailable(value.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        let uri = value
            .url()
            .map(|url| url.to_string())
            .unwrap_or_default();
        Self::MetadataUnavailable {
            uri,
            reason: value.to_string(),
        }
    }
}

impl From<market_transaction_utils::Error> for Error {
    fn from(value: market_transaction_utils::Error) -> Self {
        use market_transaction_utils::Error as TxError;
        match value {
            TxError::NetworkUnavailable(reason) => Self::NetworkUnavailable(reason),
            TxError::ConfirmationTimeout {
                signature,
                last_valid_block_height,
            } => Self::ConfirmationTimeout {
                signature,
                last_valid_block_height,
            },
            TxError::TransactionRejected {
                signature,
                error,
                code,
            } => Self::TransactionRejected {
                signature,
                error,
                code,
            },
            other => Self::Transaction(other),
        }
    }
}

impl Error {
    pub fn missing_account(name: &str, address: &Pubkey) -> Self {
        Self::MissingRequiredAccount(format!("{name} {address}"))
    }

    pub fn stale<S: ToString>(reason: S) -> Self {
        Self::StaleAccountState(reason.to_string())
    }

    pub fn cache_store<S: ToString>(reason: S) -> Self {
        Self::CacheStore(reason.to_string())
    }

    /// Errors worth retrying with backoff. Everything else is either a caller
    /// bug or needs fresh state first.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_)
                | Self::ConfirmationTimeout { .. }
                | Self::MetadataUnavailable { .. }
        )
    }
}

use solana_sdk::{
    instruction::InstructionError, message::CompileError, signature::Signature,
    transaction::TransactionError,
};

#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("compile error: {0}")]
    CompileError(#[from] CompileError),
    #[error("signer error: {0}")]
    SignerError(String),
    #[error("serialization error: {0}")]
    SerializationError(String),
    #[error("transaction is {size} bytes, limit is {limit}")]
    TransactionTooLarge { size: usize, limit: usize },
    #[error("transaction {signature} not confirmed before block height {last_valid_block_height}")]
    ConfirmationTimeout {
        signature: Signature,
        last_valid_block_height: u64,
    },
    #[error("transaction {signature} rejected: {error}")]
    TransactionRejected {
        signature: Signature,
        error: TransactionError,
        code: Option<u32>,
    },
}

impl From<solana_client::client_error::ClientError> for Error {
    fn from(value: solana_client::client_error::ClientError) -> Self {
        Self::NetworkUnavailable(value.to_string())
    }
}

impl Error {
    pub fn signer<S: ToString>(str: S) -> Self {
        Self::SignerError(str.to_string())
    }

    pub fn serialization<S: ToString>(str: S) -> Self {
        Self::SerializationError(str.to_string())
    }

    pub fn rejected(signature: Signature, error: TransactionError) -> Self {
        let code = match &error {
            TransactionError::InstructionError(_, InstructionError::Custom(code)) => Some(*code),
            _ => None,
        };
        Self::TransactionRejected {
            signature,
            error,
            code,
        }
    }

    /// Errors that may succeed when tried again after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_) | Self::ConfirmationTimeout { .. }
        )
    }
}

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::NullSigner,
    signer::Signer,
    transaction::VersionedTransaction,
};

use crate::error::Error;

pub const MAX_TRANSACTION_SIZE: usize = 1232; // Maximum transaction size in bytes

/// Compiles and signs a v0 transaction. The first signer pays.
pub fn mk_transaction(
    instructions: &[Instruction],
    signers: &[&dyn Signer],
    blockhash: Hash,
) -> Result<VersionedTransaction, Error> {
    let payer = signers
        .first()
        .ok_or_else(|| Error::signer("missing payer"))?
        .pubkey();
    let message = v0::Message::try_compile(&payer, instructions, &[], blockhash)?;
    VersionedTransaction::try_new(VersionedMessage::V0(message), signers).map_err(Error::signer)
}

pub fn serialized_len(tx: &VersionedTransaction) -> Result<usize, Error> {
    bincode::serialized_size(tx)
        .map(|size| size as usize)
        .map_err(Error::serialization)
}

pub fn ensure_fits(tx: &VersionedTransaction) -> Result<(), Error> {
    let size = serialized_len(tx)?;
    if size > MAX_TRANSACTION_SIZE {
        return Err(Error::TransactionTooLarge {
            size,
            limit: MAX_TRANSACTION_SIZE,
        });
    }
    Ok(())
}

/// Size the instruction set would have once signed by `payer` plus every other
/// signer the instructions reference.
pub fn transaction_len(instructions: &[Instruction], payer: &Pubkey) -> Result<usize, Error> {
    let mut signer_keys = vec![*payer];
    for meta in instructions.iter().flat_map(|ix| ix.accounts.iter()) {
        if meta.is_signer && !signer_keys.contains(&meta.pubkey) {
            signer_keys.push(meta.pubkey);
        }
    }
    let null_signers = signer_keys.iter().map(NullSigner::new).collect::<Vec<_>>();
    let signers = null_signers
        .iter()
        .map(|s| s as &dyn Signer)
        .collect::<Vec<_>>();
    mk_transaction(instructions, &signers, Hash::default()).and_then(|tx| serialized_len(&tx))
}

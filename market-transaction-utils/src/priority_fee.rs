use itertools::Itertools;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction, pubkey::Pubkey};

use crate::error::Error;

pub const MAX_RECENT_PRIORITY_FEE_ACCOUNTS: usize = 128;
pub const MIN_PRIORITY_FEE: u64 = 1;
/// Compute unit limit used by every marketplace flow
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 300_000;

pub fn compute_budget_instruction(compute_limit: u32) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_limit(compute_limit)
}

pub fn compute_price_instruction(priority_fee: u64) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_price(priority_fee)
}

pub fn is_compute_budget_instruction(ix: &Instruction) -> bool {
    ix.program_id == solana_sdk::compute_budget::id()
}

/// Strips any compute budget instructions from `instructions` and puts a fresh
/// limit (and optional price) at the front of the set.
pub fn with_compute_budget(
    instructions: Vec<Instruction>,
    compute_limit: u32,
    priority_fee: Option<u64>,
) -> Vec<Instruction> {
    std::iter::once(compute_budget_instruction(compute_limit))
        .chain(priority_fee.map(compute_price_instruction))
        .chain(
            instructions
                .into_iter()
                .filter(|ix| !is_compute_budget_instruction(ix)),
        )
        .collect()
}

pub async fn get_estimate<C: AsRef<RpcClient>>(
    client: &C,
    accounts: &[Pubkey],
) -> Result<u64, Error> {
    get_estimate_with_min(client, accounts, MIN_PRIORITY_FEE).await
}

pub async fn get_estimate_with_min<C: AsRef<RpcClient>>(
    client: &C,
    accounts: &[Pubkey],
    min_priority_fee: u64,
) -> Result<u64, Error> {
    let account_keys: Vec<Pubkey> = accounts
        .iter()
        .take(MAX_RECENT_PRIORITY_FEE_ACCOUNTS)
        .cloned()
        .collect();
    let recent_fees = client
        .as_ref()
        .get_recent_prioritization_fees(&account_keys)
        .await?
        .into_iter()
        .map(|fee| (fee.slot, fee.prioritization_fee))
        .collect_vec();
    Ok(median_of_slot_maximums(recent_fees, min_priority_fee))
}

/// Median of the per-slot maximum fee over the 20 most recent slots, floored at
/// `min_priority_fee`.
pub fn median_of_slot_maximums(samples: Vec<(u64, u64)>, min_priority_fee: u64) -> u64 {
    let mut max_per_slot = Vec::new();
    for (slot, fees) in &samples
        .into_iter()
        .sorted_by_key(|(slot, _)| *slot)
        .chunk_by(|(slot, _)| *slot)
    {
        let Some(maximum) = fees.map(|(_, fee)| fee).max() else {
            continue;
        };
        max_per_slot.push((slot, maximum));
    }
    max_per_slot.sort_by(|a, b| a.0.cmp(&b.0).reverse());
    let mut max_per_slot: Vec<_> = max_per_slot.into_iter().take(20).map(|x| x.1).collect();
    max_per_slot.sort();
    let num_recent_fees = max_per_slot.len();
    let mid = num_recent_fees / 2;
    if num_recent_fees == 0 {
        min_priority_fee
    } else if num_recent_fees % 2 == 0 {
        (max_per_slot[mid - 1] + max_per_slot[mid]) / 2
    } else {
        max_per_slot[mid]
    }
    .max(min_priority_fee)
}

/// Lamports a transaction will cost on top of any transfers it makes
pub fn network_fee(instructions: &[Instruction], payer: &Pubkey, compute_limit: u32, priority_fee: u64) -> u64 {
    let num_unique_signers = instructions
        .iter()
        .flat_map(|i| i.accounts.iter())
        .filter(|a| a.is_signer)
        .map(|a| a.pubkey)
        .chain(std::iter::once(*payer))
        .unique()
        .count();
    priority_fee
        .saturating_mul(compute_limit as u64)
        .div_ceil(1_000_000)
        .saturating_add(num_unique_signers as u64 * 5000)
}

#[cfg(test)]
mod tests {
    use solana_sdk::instruction::AccountMeta;

    use super::*;

    #[test]
    fn budget_is_moved_to_the_front() {
        let program = Pubkey::new_unique();
        let ix = Instruction::new_with_bytes(program, &[1], vec![]);
        let ixs = with_compute_budget(
            vec![ix.clone(), compute_budget_instruction(1_000_000)],
            DEFAULT_COMPUTE_UNIT_LIMIT,
            Some(5),
        );
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0], compute_budget_instruction(DEFAULT_COMPUTE_UNIT_LIMIT));
        assert_eq!(ixs[1], compute_price_instruction(5));
        assert_eq!(ixs[2], ix);
    }

    #[test]
    fn median_uses_slot_maximums() {
        let samples = vec![(1, 10), (1, 50), (2, 20), (3, 30), (4, 0)];
        // per slot maxima: 50, 20, 30, 0 -> sorted 0, 20, 30, 50
        assert_eq!(median_of_slot_maximums(samples, 1), 25);
        assert_eq!(median_of_slot_maximums(vec![], 7), 7);
        assert_eq!(median_of_slot_maximums(vec![(9, 3)], 7), 7);
    }

    #[test]
    fn network_fee_counts_unique_signers() {
        let payer = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[],
            vec![AccountMeta::new(payer, true), AccountMeta::new(other, true)],
        );
        assert_eq!(network_fee(&[ix.clone(), ix], &payer, 300_000, 0), 10_000);
    }

    #[test]
    fn network_fee_saturates_on_huge_priority_fee() {
        let payer = Pubkey::new_unique();
        assert_eq!(
            network_fee(&[], &payer, 1_400_000, u64::MAX),
            u64::MAX.div_ceil(1_000_000) + 5000
        );
    }
}

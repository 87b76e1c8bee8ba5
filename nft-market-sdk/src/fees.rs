use serde::Serialize;

use crate::{accounts::MAX_BASIS_POINTS, error::Error};

/// Breakdown of what a buyer pays for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub price: u64,
    pub marketplace_fee: u64,
    pub royalty: u64,
    pub total: u64,
}

/// `floor(amount * bps / 10000)` computed in 128 bits
pub fn basis_points_of(amount: u64, bps: u16) -> Result<u64, Error> {
    if bps > MAX_BASIS_POINTS {
        return Err(Error::InvalidFeeParameters(format!(
            "{bps} basis points exceeds {MAX_BASIS_POINTS}"
        )));
    }
    let fee = (amount as u128) * (bps as u128) / (MAX_BASIS_POINTS as u128);
    // bps <= 10000 keeps the result <= amount
    Ok(fee as u64)
}

pub fn compute_split(price: u64, marketplace_fee_bps: u16, royalty_bps: u16) -> Result<FeeSplit, Error> {
    let marketplace_fee = basis_points_of(price, marketplace_fee_bps)?;
    let royalty = basis_points_of(price, royalty_bps)?;
    let total = price
        .checked_add(marketplace_fee)
        .and_then(|sum| sum.checked_add(royalty))
        .ok_or_else(|| {
            Error::InvalidFeeParameters(format!("total for price {price} overflows"))
        })?;
    Ok(FeeSplit {
        price,
        marketplace_fee,
        royalty,
        total,
    })
}

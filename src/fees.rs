//! Fee calculation
//!
//! NUT-02 input fees and the NUT-08 blank output count.
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use std::collections::HashMap;

use crate::nuts::Id;
use crate::{Amount, Error};

/// Fee required for a proof set
///
/// Sums the fee ppk of every input and applies the ceiling once:
/// `fee = ceil(sum_ppk / 1000)`.
pub fn calculate_fee(
    proofs_count: &HashMap<Id, u64>,
    keyset_fee_ppk: &HashMap<Id, u64>,
) -> Result<Amount, Error> {
    let mut sum_fee: u64 = 0;

    for (keyset_id, proof_count) in proofs_count {
        let fee_ppk = keyset_fee_ppk
            .get(keyset_id)
            .ok_or(Error::KeysetUnknown(*keyset_id))?;

        sum_fee = sum_fee
            .checked_add(fee_ppk.checked_mul(*proof_count).ok_or(Error::Internal)?)
            .ok_or(Error::Internal)?;
    }

    let fee = (sum_fee + 999) / 1000;

    Ok(fee.into())
}

/// Number of blank outputs a wallet must provide for potential change
///
/// `max(ceil(log2(fee_reserve + 1)), 1)`, and none at all for a zero
/// reserve [NUT-08].
pub fn blank_outputs_count(fee_reserve: Amount) -> u64 {
    let fee_reserve: u64 = fee_reserve.into();

    if fee_reserve == 0 {
        return 0;
    }

    // ceil(log2(n + 1)) is the bit length of n
    let bits = u64::from(u64::BITS - fee_reserve.leading_zeros());

    bits.max(1)
}

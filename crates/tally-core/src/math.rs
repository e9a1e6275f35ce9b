//! Fixed-point accrual arithmetic.
//!
//! Every multiply, add and subtract is checked; overflow is an error, never a
//! wraparound. Divisions truncate toward zero, so the ledger can only ever
//! under-distribute relative to the exact rational result.

use crate::constants::ACC_REWARD_PRECISION;
use crate::error::MathError;

/// Reward credited to one pool for `elapsed` seconds.
///
/// `elapsed * rate * weight / total_weight`, truncating. A zero-weight pool
/// earns nothing even when `total_weight` is zero; a weighted pool with a
/// zero `total_weight` means the weight accounting is corrupt.
pub fn period_reward(
    elapsed: u64,
    rate: u128,
    weight: u64,
    total_weight: u64,
) -> Result<u128, MathError> {
    if weight == 0 {
        return Ok(0);
    }
    if total_weight == 0 {
        return Err(MathError::ZeroTotalWeight { weight });
    }
    let gross = (elapsed as u128)
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(weight as u128))
        .ok_or(MathError::Overflow)?;
    Ok(gross / total_weight as u128)
}

/// Accumulator increment for spreading `reward` over `supply` units.
///
/// `reward * ACC_REWARD_PRECISION / supply`, truncating.
pub fn accumulator_step(reward: u128, supply: u128) -> Result<u128, MathError> {
    if supply == 0 {
        return Err(MathError::DivisionByZero);
    }
    reward
        .checked_mul(ACC_REWARD_PRECISION)
        .map(|v| v / supply)
        .ok_or(MathError::Overflow)
}

/// Descaled entitlement `amount * acc / ACC_REWARD_PRECISION` as a signed value.
pub fn accumulated(amount: u128, acc_reward_per_share: u128) -> Result<i128, MathError> {
    let scaled = amount
        .checked_mul(acc_reward_per_share)
        .ok_or(MathError::Overflow)?
        / ACC_REWARD_PRECISION;
    to_signed(scaled)
}

/// Convert an unsigned amount into the signed debt domain.
pub fn to_signed(value: u128) -> Result<i128, MathError> {
    i128::try_from(value).map_err(|_| MathError::Overflow)
}

/// `accumulated - debt`, which must not be negative.
pub fn pending(accumulated: i128, debt: i128) -> Result<u128, MathError> {
    let diff = accumulated.checked_sub(debt).ok_or(MathError::Overflow)?;
    if diff < 0 {
        return Err(MathError::NegativePending { accumulated, debt });
    }
    Ok(diff as u128)
}

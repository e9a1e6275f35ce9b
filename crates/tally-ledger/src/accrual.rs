//! Lazy per-pool accumulator update.
//!
//! A pool's accumulator is brought up to date only when something touches the
//! pool. `supply` is the custody balance of the pool's collateral, read from
//! the asset ledger rather than summed over positions, so direct transfers
//! into custody are shared out like any other collateral.

use tally_core::error::MathError;
use tally_core::math;
use tally_core::types::Pool;

/// Global emission parameters read during accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    /// Reward units per second across all pools.
    pub rate: u128,
    /// Sum of all pool weights.
    pub total_weight: u64,
}

/// The accumulator value `pool` would have at `now`, without the pool changing.
///
/// Returns the stored value when `now` is not after the last accrual or the
/// pool holds no collateral.
pub fn projected_acc(
    pool: &Pool,
    now: u64,
    supply: u128,
    emission: Emission,
) -> Result<u128, MathError> {
    if now <= pool.last_accrual_time || supply == 0 {
        return Ok(pool.acc_reward_per_share);
    }
    let elapsed = now - pool.last_accrual_time;
    let reward = math::period_reward(elapsed, emission.rate, pool.weight, emission.total_weight)?;
    let step = math::accumulator_step(reward, supply)?;
    pool.acc_reward_per_share
        .checked_add(step)
        .ok_or(MathError::Overflow)
}

/// Accrue `pool` up to `now`.
///
/// Returns `Ok(false)` without touching the pool when `now` is not after its
/// last accrual. Otherwise the accumulator advances (unless `supply` is zero)
/// and `last_accrual_time` moves to `now`. On error the pool is unchanged.
pub fn accrue(pool: &mut Pool, now: u64, supply: u128, emission: Emission) -> Result<bool, MathError> {
    if now <= pool.last_accrual_time {
        return Ok(false);
    }
    let acc = projected_acc(pool, now, supply, emission)?;
    pool.acc_reward_per_share = acc;
    pool.last_accrual_time = now;
    Ok(true)
}

//! Position book and position transitions.
//!
//! Each transition takes the pool's up-to-date accumulator and returns the
//! new position; the caller stores it. New collateral adds its accumulator
//! value to debt, so it earns nothing retroactively. Departing collateral
//! removes the drop in the position's floored entitlement from debt, which
//! leaves `pending` exactly where it was; removing the floored value of the
//! withdrawn amount alone can undershoot by one unit and drive `pending`
//! negative.

use std::collections::HashMap;

use tally_core::error::{LedgerError, MathError};
use tally_core::math;
use tally_core::types::{AccountId, PoolId, Position};

/// Positions keyed by (pool, participant). Entries are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBook {
    entries: HashMap<(PoolId, AccountId), Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored position, or an all-zero one if the key was never touched.
    pub fn get(&self, pid: PoolId, user: &AccountId) -> Position {
        self.entries
            .get(&(pid, user.clone()))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn lookup(&self, key: &(PoolId, AccountId)) -> Option<Position> {
        self.entries.get(key).copied()
    }

    pub(crate) fn put(&mut self, pid: PoolId, user: AccountId, position: Position) {
        self.entries.insert((pid, user), position);
    }

    pub(crate) fn restore(&mut self, key: (PoolId, AccountId), previous: Option<Position>) {
        match previous {
            Some(p) => {
                self.entries.insert(key, p);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    /// All positions in one pool, in no particular order.
    pub fn in_pool(&self, pid: PoolId) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.entries
            .iter()
            .filter(move |((p, _), _)| *p == pid)
            .map(|((_, user), pos)| (user, pos))
    }

    /// Sum of locked amounts in one pool.
    pub fn total_amount(&self, pid: PoolId) -> u128 {
        self.in_pool(pid).map(|(_, p)| p.amount).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Add `amount` of collateral.
pub fn credit(position: Position, amount: u128, acc: u128) -> Result<Position, MathError> {
    Ok(Position {
        amount: position.amount.checked_add(amount).ok_or(MathError::Overflow)?,
        debt: position
            .debt
            .checked_add(math::accumulated(amount, acc)?)
            .ok_or(MathError::Overflow)?,
    })
}

/// Remove `amount` of collateral, keeping its earned reward pending.
pub fn debit(
    pid: PoolId,
    position: Position,
    amount: u128,
    acc: u128,
) -> Result<Position, LedgerError> {
    let remaining = remaining_after(pid, position, amount)?;
    let released = position
        .accumulated(acc)?
        .checked_sub(math::accumulated(remaining, acc)?)
        .ok_or(MathError::Overflow)?;
    Ok(Position {
        amount: remaining,
        debt: position
            .debt
            .checked_sub(released)
            .ok_or(MathError::Overflow)?,
    })
}

/// Settle all pending reward. Returns the settled position and the reward.
pub fn settle(position: Position, acc: u128) -> Result<(Position, u128), MathError> {
    let accumulated = position.accumulated(acc)?;
    let pending = math::pending(accumulated, position.debt)?;
    Ok((
        Position {
            amount: position.amount,
            debt: accumulated,
        },
        pending,
    ))
}

/// Settle pending reward and remove `amount` of collateral in one step.
///
/// Equivalent to [`settle`] followed by [`debit`] at the same accumulator:
/// the remaining collateral ends fully settled.
pub fn settle_and_debit(
    pid: PoolId,
    position: Position,
    amount: u128,
    acc: u128,
) -> Result<(Position, u128), LedgerError> {
    let remaining = remaining_after(pid, position, amount)?;
    let pending = math::pending(position.accumulated(acc)?, position.debt)?;
    Ok((
        Position {
            amount: remaining,
            debt: math::accumulated(remaining, acc)?,
        },
        pending,
    ))
}

fn remaining_after(pid: PoolId, position: Position, amount: u128) -> Result<u128, LedgerError> {
    position
        .amount
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientPosition {
            pool: pid,
            have: position.amount,
            need: amount,
        })
}

//! Ordered pool registry with total-weight bookkeeping.
//!
//! Invariant: `total_weight` equals the sum of every pool's `weight`. The
//! registry does not detect the same collateral asset being registered twice;
//! two pools sharing an asset share one custody balance and both count it as
//! their supply.

use serde::{Deserialize, Serialize};

use tally_core::error::{LedgerError, MathError};
use tally_core::types::{Pool, PoolId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
    total_weight: u64,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pool and add its weight to the total.
    pub fn add(&mut self, pool: Pool) -> Result<PoolId, LedgerError> {
        let id = u32::try_from(self.pools.len()).map_err(|_| MathError::Overflow)?;
        self.total_weight = self
            .total_weight
            .checked_add(pool.weight)
            .ok_or(MathError::Overflow)?;
        self.pools.push(pool);
        Ok(PoolId(id))
    }

    /// Replace a pool's weight, returning the previous one.
    pub fn set_weight(&mut self, pid: PoolId, weight: u64) -> Result<u64, LedgerError> {
        let old = self.get(pid)?.weight;
        let total = self
            .total_weight
            .checked_sub(old)
            .and_then(|t| t.checked_add(weight))
            .ok_or(MathError::Overflow)?;
        self.get_mut(pid)?.weight = weight;
        self.total_weight = total;
        Ok(old)
    }

    pub fn get(&self, pid: PoolId) -> Result<&Pool, LedgerError> {
        self.pools.get(pid.index()).ok_or(LedgerError::UnknownPool(pid))
    }

    /// Mutable access for accumulator and metadata updates.
    ///
    /// Weight must be changed through [`set_weight`](Self::set_weight).
    pub fn get_mut(&mut self, pid: PoolId) -> Result<&mut Pool, LedgerError> {
        self.pools
            .get_mut(pid.index())
            .ok_or(LedgerError::UnknownPool(pid))
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// All pool ids in registration order.
    pub fn ids(&self) -> Vec<PoolId> {
        (0..self.pools.len() as u32).map(PoolId).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &Pool)> {
        self.pools
            .iter()
            .enumerate()
            .map(|(i, p)| (PoolId(i as u32), p))
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.pools.truncate(len);
    }

    pub(crate) fn restore(&mut self, pid: PoolId, pool: Pool) {
        if let Some(slot) = self.pools.get_mut(pid.index()) {
            *slot = pool;
        }
    }

    pub(crate) fn set_total_weight(&mut self, total_weight: u64) {
        self.total_weight = total_weight;
    }
}

//! Undo journal for one in-flight ledger operation.
//!
//! Stores the first pre-image of everything the operation overwrites, plus the
//! events it wants to emit. Committing keeps the events; aborting hands the
//! pre-images back to the ledger.

use tally_core::event::LedgerEvent;
use tally_core::types::{AccountId, Pool, PoolId, Position};

#[derive(Debug, Default)]
pub(crate) struct Journal {
    /// Registry length before the first pool was appended.
    pub(crate) pool_count: Option<usize>,
    pub(crate) pools: Vec<(PoolId, Pool)>,
    pub(crate) positions: Vec<((PoolId, AccountId), Option<Position>)>,
    pub(crate) total_weight: Option<u64>,
    pub(crate) emission_rate: Option<u128>,
    pub(crate) admin: Option<AccountId>,
    pub(crate) events: Vec<LedgerEvent>,
}

impl Journal {
    pub(crate) fn record_pool_count(&mut self, len: usize) {
        self.pool_count.get_or_insert(len);
    }

    pub(crate) fn record_pool(&mut self, pid: PoolId, pool: &Pool) {
        if !self.pools.iter().any(|(id, _)| *id == pid) {
            self.pools.push((pid, pool.clone()));
        }
    }

    pub(crate) fn record_position(&mut self, key: &(PoolId, AccountId), previous: Option<Position>) {
        if !self.positions.iter().any(|(k, _)| k == key) {
            self.positions.push((key.clone(), previous));
        }
    }

    pub(crate) fn record_total_weight(&mut self, total_weight: u64) {
        self.total_weight.get_or_insert(total_weight);
    }

    pub(crate) fn record_emission_rate(&mut self, rate: u128) {
        self.emission_rate.get_or_insert(rate);
    }

    pub(crate) fn record_admin(&mut self, admin: &AccountId) {
        if self.admin.is_none() {
            self.admin = Some(admin.clone());
        }
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }
}

//! Single-writer, multi-reader ledger handle.
//!
//! [`SharedLedger`] wraps a [`Ledger`] in an `Arc<RwLock<_>>`. Every mutating
//! call holds the write lock for the whole operation, so operations are
//! serialized and never observe each other half-applied. Views take the read
//! lock and may run concurrently with each other.

use std::sync::Arc;

use parking_lot::RwLock;

use tally_core::error::LedgerError;
use tally_core::event::LedgerEvent;
use tally_core::traits::AssetLedger;
use tally_core::types::{AccountId, PoolId, Position};

use crate::ledger::{Ledger, LedgerSnapshot};

pub struct SharedLedger<A: AssetLedger> {
    inner: Arc<RwLock<Ledger<A>>>,
}

impl<A: AssetLedger> Clone for SharedLedger<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AssetLedger> SharedLedger<A> {
    pub fn new(ledger: Ledger<A>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Run `f` with exclusive access. Use for any mutating operation.
    pub fn write<T>(&self, f: impl FnOnce(&mut Ledger<A>) -> T) -> T {
        f(&mut *self.inner.write())
    }

    /// Run `f` with shared access.
    pub fn read<T>(&self, f: impl FnOnce(&Ledger<A>) -> T) -> T {
        f(&*self.inner.read())
    }

    pub fn deposit(
        &self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<(), LedgerError> {
        self.write(|l| l.deposit(caller, pid, amount, to))
    }

    pub fn withdraw(
        &self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<(), LedgerError> {
        self.write(|l| l.withdraw(caller, pid, amount, to))
    }

    pub fn harvest(&self, caller: &AccountId, pid: PoolId, to: &AccountId) -> Result<u128, LedgerError> {
        self.write(|l| l.harvest(caller, pid, to))
    }

    pub fn withdraw_and_harvest(
        &self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<u128, LedgerError> {
        self.write(|l| l.withdraw_and_harvest(caller, pid, amount, to))
    }

    pub fn emergency_withdraw(
        &self,
        caller: &AccountId,
        pid: PoolId,
        to: &AccountId,
    ) -> Result<u128, LedgerError> {
        self.write(|l| l.emergency_withdraw(caller, pid, to))
    }

    pub fn pending_reward(&self, pid: PoolId, user: &AccountId) -> Result<u128, LedgerError> {
        self.read(|l| l.pending_reward(pid, user))
    }

    pub fn position(&self, pid: PoolId, user: &AccountId) -> Position {
        self.read(|l| l.position(pid, user))
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.read(|l| l.snapshot())
    }

    pub fn drain_events(&self) -> Vec<LedgerEvent> {
        self.write(|l| l.drain_events())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tally_core::clock::ManualClock;
    use tally_core::types::AssetId;

    use super::*;
    use crate::config::LedgerConfig;
    use crate::memory::MemoryAssets;

    fn shared(users: &[AccountId]) -> (SharedLedger<MemoryAssets>, ManualClock) {
        let clock = ManualClock::new(0);
        let config = LedgerConfig {
            emission_rate: 1_000,
            ..LedgerConfig::default()
        };
        let admin = config.admin.clone();
        let mut assets = MemoryAssets::new();
        for u in users {
            assets.mint(&AssetId::from("LP"), u, 1_000).unwrap();
        }
        assets
            .mint(&config.reward_asset, &config.reward_vault, u128::from(u64::MAX))
            .unwrap();
        let mut ledger = Ledger::new(config, assets, Arc::new(clock.clone()));
        ledger.add_pool(&admin, 1, AssetId::from("LP"), None).unwrap();
        (SharedLedger::new(ledger), clock)
    }

    #[test]
    fn handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedLedger<MemoryAssets>>();
    }

    #[test]
    fn concurrent_writers_are_serialized() {
        let users: Vec<AccountId> = (0..8).map(|i| AccountId::new(format!("user{i}"))).collect();
        let (ledger, _clock) = shared(&users);

        let handles: Vec<_> = users
            .iter()
            .cloned()
            .map(|u| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        ledger.deposit(&u, PoolId(0), 10, &u).unwrap();
                    }
                    for _ in 0..5 {
                        ledger.withdraw(&u, PoolId(0), 10, &u).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for u in &users {
            assert_eq!(ledger.position(PoolId(0), u).amount, 50);
        }
        let supply = ledger.read(|l| l.pool_supply(PoolId(0)).unwrap());
        assert_eq!(supply, 400);
    }

    #[test]
    fn readers_see_committed_state() {
        let alice = AccountId::from("alice");
        let (ledger, clock) = shared(std::slice::from_ref(&alice));
        ledger.deposit(&alice, PoolId(0), 100, &alice).unwrap();
        clock.set(3);
        assert_eq!(ledger.pending_reward(PoolId(0), &alice).unwrap(), 3_000);
        assert_eq!(ledger.harvest(&alice, PoolId(0), &alice).unwrap(), 3_000);
        let snap = ledger.snapshot().unwrap();
        assert_eq!(snap.positions.len(), 1);
        assert_eq!(snap.positions[0].pending, 0);
        assert!(!ledger.drain_events().is_empty());
    }
}

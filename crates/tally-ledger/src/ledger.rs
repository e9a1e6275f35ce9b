//! The ledger: pools, positions, emission parameters, and every operation on
//! them.
//!
//! Each mutating operation runs as one unit:
//! 1. accrue the target pool to the current instant,
//! 2. update the position and pool state,
//! 3. move assets,
//! 4. notify the pool's rewarder.
//!
//! Any error along the way rolls back the asset ledger to the checkpoint
//! taken at the start, restores every overwritten pool and position from the
//! journal, and drops the operation's events. Nothing is partially committed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tally_core::error::LedgerError;
use tally_core::event::LedgerEvent;
use tally_core::traits::{AssetLedger, Clock, Migrator, Rewarder};
use tally_core::types::{AccountId, AssetId, Pool, PoolId, Position, RewardNotice, RewarderId};

use crate::accrual::{self, Emission};
use crate::config::{AccrualPolicy, LedgerConfig};
use crate::journal::Journal;
use crate::positions::{self, PositionBook};
use crate::registry::PoolRegistry;

/// A position as seen by a reader, with pending reward projected to `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub pool: PoolId,
    pub user: AccountId,
    pub amount: u128,
    pub debt: i128,
    pub pending: u128,
}

/// Point-in-time copy of the ledger's accounting state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub time: u64,
    pub emission_rate: u128,
    pub total_weight: u64,
    pub pools: Vec<(PoolId, Pool)>,
    /// Sorted by (pool, user).
    pub positions: Vec<PositionSnapshot>,
}

/// A multi-pool reward ledger over an asset ledger `A`.
///
/// Not thread-safe on its own; share it through
/// [`SharedLedger`](crate::shared::SharedLedger).
pub struct Ledger<A: AssetLedger> {
    config: LedgerConfig,
    emission_rate: u128,
    registry: PoolRegistry,
    positions: PositionBook,
    rewarders: HashMap<RewarderId, Box<dyn Rewarder>>,
    pub(crate) migrator: Option<Box<dyn Migrator>>,
    pub(crate) assets: A,
    clock: Arc<dyn Clock>,
    events: Vec<LedgerEvent>,
}

impl<A: AssetLedger> Ledger<A> {
    /// Create an empty ledger. The emission rate starts at `config.emission_rate`.
    pub fn new(config: LedgerConfig, assets: A, clock: Arc<dyn Clock>) -> Self {
        Self {
            emission_rate: config.emission_rate,
            config,
            registry: PoolRegistry::new(),
            positions: PositionBook::new(),
            rewarders: HashMap::new(),
            migrator: None,
            assets,
            clock,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn admin(&self) -> &AccountId {
        &self.config.admin
    }

    pub fn emission_rate(&self) -> u128 {
        self.emission_rate
    }

    pub fn total_weight(&self) -> u64 {
        self.registry.total_weight()
    }

    pub fn pool_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pool(&self, pid: PoolId) -> Result<&Pool, LedgerError> {
        self.registry.get(pid)
    }

    pub fn pools(&self) -> impl Iterator<Item = (PoolId, &Pool)> {
        self.registry.iter()
    }

    /// Stored position; all-zero if never touched.
    pub fn position(&self, pid: PoolId, user: &AccountId) -> Position {
        self.positions.get(pid, user)
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Direct access to the asset ledger, e.g. for funding accounts or
    /// transferring collateral straight into custody.
    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    pub fn has_migrator(&self) -> bool {
        self.migrator.is_some()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Committed events not yet drained.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Custody balance of a pool's collateral (the accrual supply).
    pub fn pool_supply(&self, pid: PoolId) -> Result<u128, LedgerError> {
        let pool = self.registry.get(pid)?;
        Ok(self.assets.balance_of(&pool.collateral, &self.config.custody)?)
    }

    /// Reward `user` could harvest from `pid` right now.
    ///
    /// Projects the pool's accumulator to the current instant without
    /// writing anything.
    pub fn pending_reward(&self, pid: PoolId, user: &AccountId) -> Result<u128, LedgerError> {
        let pool = self.registry.get(pid)?;
        let supply = self.assets.balance_of(&pool.collateral, &self.config.custody)?;
        let acc = accrual::projected_acc(pool, self.clock.now(), supply, self.emission())?;
        Ok(self.positions.get(pid, user).pending(acc)?)
    }

    /// Secondary rewards the pool's rewarder reports for `user`.
    pub fn rewarder_pending(
        &self,
        pid: PoolId,
        user: &AccountId,
    ) -> Result<Vec<(AssetId, u128)>, LedgerError> {
        let pool = self.registry.get(pid)?;
        let Some(id) = &pool.rewarder else {
            return Ok(Vec::new());
        };
        let rewarder = self
            .rewarders
            .get(id)
            .ok_or_else(|| LedgerError::UnknownRewarder(id.clone()))?;
        let pending = self.pending_reward(pid, user)?;
        Ok(rewarder.pending_tokens(pid, user, pending))
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let pools: Vec<(PoolId, Pool)> = self.registry.iter().map(|(id, p)| (id, p.clone())).collect();
        let mut positions = Vec::new();
        for (pid, _) in &pools {
            for (user, pos) in self.positions.in_pool(*pid) {
                positions.push(PositionSnapshot {
                    pool: *pid,
                    user: user.clone(),
                    amount: pos.amount,
                    debt: pos.debt,
                    pending: self.pending_reward(*pid, user)?,
                });
            }
        }
        positions.sort_by(|a, b| (a.pool, &a.user).cmp(&(b.pool, &b.user)));
        Ok(LedgerSnapshot {
            time: self.clock.now(),
            emission_rate: self.emission_rate,
            total_weight: self.registry.total_weight(),
            pools,
            positions,
        })
    }

    // ------------------------------------------------------------------
    // Accrual
    // ------------------------------------------------------------------

    /// Bring one pool's accumulator up to the current instant.
    pub fn accrue(&mut self, pid: PoolId) -> Result<Pool, LedgerError> {
        self.atomically(|l, j| l.accrue_in(j, pid))
    }

    /// Accrue several pools, all or nothing.
    pub fn accrue_pools(&mut self, pids: &[PoolId]) -> Result<(), LedgerError> {
        self.atomically(|l, j| {
            for &pid in pids {
                l.accrue_in(j, pid)?;
            }
            Ok(())
        })
    }

    /// Accrue every registered pool.
    pub fn accrue_all(&mut self) -> Result<(), LedgerError> {
        self.atomically(|l, j| l.sweep_in(j))
    }

    // ------------------------------------------------------------------
    // Positions
    // ------------------------------------------------------------------

    /// Lock `amount` of the pool's collateral from `caller` into the position of `to`.
    ///
    /// Pending reward of `to` is left untouched.
    pub fn deposit(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<(), LedgerError> {
        self.atomically(|l, j| {
            let pool = l.accrue_in(j, pid)?;
            let position = positions::credit(l.positions.get(pid, to), amount, pool.acc_reward_per_share)?;
            l.store_position(j, pid, to, position);
            j.emit(LedgerEvent::Deposit {
                user: caller.clone(),
                pool: pid,
                amount,
                to: to.clone(),
            });

            l.assets
                .transfer(&pool.collateral, caller, &l.config.custody, amount)?;
            l.notify(
                &pool,
                RewardNotice {
                    pool: pid,
                    user: to.clone(),
                    recipient: to.clone(),
                    reward: 0,
                    new_amount: position.amount,
                },
            )?;
            debug!(pool = %pid, user = %to, amount = %amount, "deposit");
            Ok(())
        })
    }

    /// Release `amount` of `caller`'s collateral to `to`. Pending reward stays pending.
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<(), LedgerError> {
        self.atomically(|l, j| {
            let pool = l.accrue_in(j, pid)?;
            let position = positions::debit(
                pid,
                l.positions.get(pid, caller),
                amount,
                pool.acc_reward_per_share,
            )?;
            l.store_position(j, pid, caller, position);
            j.emit(LedgerEvent::Withdraw {
                user: caller.clone(),
                pool: pid,
                amount,
                to: to.clone(),
            });

            l.assets
                .transfer(&pool.collateral, &l.config.custody, to, amount)?;
            l.notify(
                &pool,
                RewardNotice {
                    pool: pid,
                    user: caller.clone(),
                    recipient: to.clone(),
                    reward: 0,
                    new_amount: position.amount,
                },
            )?;
            debug!(pool = %pid, user = %caller, amount = %amount, "withdraw");
            Ok(())
        })
    }

    /// Pay `caller`'s pending reward to `to`. Returns the amount paid.
    pub fn harvest(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        to: &AccountId,
    ) -> Result<u128, LedgerError> {
        self.atomically(|l, j| {
            let pool = l.accrue_in(j, pid)?;
            let (position, pending) =
                positions::settle(l.positions.get(pid, caller), pool.acc_reward_per_share)?;
            l.store_position(j, pid, caller, position);
            j.emit(LedgerEvent::Harvest {
                user: caller.clone(),
                pool: pid,
                amount: pending,
            });

            l.pay_reward(to, pending)?;
            l.notify(
                &pool,
                RewardNotice {
                    pool: pid,
                    user: caller.clone(),
                    recipient: to.clone(),
                    reward: pending,
                    new_amount: position.amount,
                },
            )?;
            debug!(pool = %pid, user = %caller, reward = %pending, "harvest");
            Ok(pending)
        })
    }

    /// Withdraw `amount` and harvest in one step. Returns the reward paid.
    pub fn withdraw_and_harvest(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        amount: u128,
        to: &AccountId,
    ) -> Result<u128, LedgerError> {
        self.atomically(|l, j| {
            let pool = l.accrue_in(j, pid)?;
            let (position, pending) = positions::settle_and_debit(
                pid,
                l.positions.get(pid, caller),
                amount,
                pool.acc_reward_per_share,
            )?;
            l.store_position(j, pid, caller, position);
            j.emit(LedgerEvent::Withdraw {
                user: caller.clone(),
                pool: pid,
                amount,
                to: to.clone(),
            });
            j.emit(LedgerEvent::Harvest {
                user: caller.clone(),
                pool: pid,
                amount: pending,
            });

            l.pay_reward(to, pending)?;
            l.assets
                .transfer(&pool.collateral, &l.config.custody, to, amount)?;
            l.notify(
                &pool,
                RewardNotice {
                    pool: pid,
                    user: caller.clone(),
                    recipient: to.clone(),
                    reward: pending,
                    new_amount: position.amount,
                },
            )?;
            debug!(pool = %pid, user = %caller, amount = %amount, reward = %pending, "withdraw and harvest");
            Ok(pending)
        })
    }

    /// Return all of `caller`'s collateral to `to`, forfeiting pending reward.
    ///
    /// Does not accrue and never touches the reward asset. A failing rewarder
    /// is logged and ignored. Returns the amount released.
    pub fn emergency_withdraw(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        to: &AccountId,
    ) -> Result<u128, LedgerError> {
        self.atomically(|l, j| {
            let pool = l.registry.get(pid)?.clone();
            let amount = l.positions.get(pid, caller).amount;
            l.store_position(j, pid, caller, Position::default());
            j.emit(LedgerEvent::EmergencyWithdraw {
                user: caller.clone(),
                pool: pid,
                amount,
                to: to.clone(),
            });

            l.assets
                .transfer(&pool.collateral, &l.config.custody, to, amount)?;
            let notice = RewardNotice {
                pool: pid,
                user: caller.clone(),
                recipient: to.clone(),
                reward: 0,
                new_amount: 0,
            };
            if let Err(e) = l.notify(&pool, notice) {
                warn!(pool = %pid, user = %caller, error = %e, "rewarder failed during emergency withdraw, ignoring");
            }
            info!(pool = %pid, user = %caller, amount = %amount, "emergency withdraw");
            Ok(amount)
        })
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Register a new pool. The caller must not register the same collateral twice.
    pub fn add_pool(
        &mut self,
        caller: &AccountId,
        weight: u64,
        collateral: AssetId,
        rewarder: Option<RewarderId>,
    ) -> Result<PoolId, LedgerError> {
        self.ensure_admin(caller)?;
        self.atomically(|l, j| {
            l.check_rewarder(rewarder.as_ref())?;
            l.sweep_if_configured(j)?;
            j.record_pool_count(l.registry.len());
            j.record_total_weight(l.registry.total_weight());
            let now = l.clock.now();
            let pid = l
                .registry
                .add(Pool::new(weight, collateral.clone(), rewarder.clone(), now))?;
            info!(pool = %pid, weight, collateral = %collateral, "pool added");
            j.emit(LedgerEvent::PoolAdded {
                pool: pid,
                weight,
                collateral,
                rewarder,
            });
            Ok(pid)
        })
    }

    /// Change a pool's weight, and its rewarder when `overwrite` is set.
    pub fn set_pool(
        &mut self,
        caller: &AccountId,
        pid: PoolId,
        weight: u64,
        rewarder: Option<RewarderId>,
        overwrite: bool,
    ) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        self.atomically(|l, j| {
            l.registry.get(pid)?;
            if overwrite {
                l.check_rewarder(rewarder.as_ref())?;
            }
            l.sweep_if_configured(j)?;
            j.record_pool(pid, l.registry.get(pid)?);
            j.record_total_weight(l.registry.total_weight());
            let old = l.registry.set_weight(pid, weight)?;
            if overwrite {
                l.registry.get_mut(pid)?.rewarder = rewarder;
            }
            let effective = l.registry.get(pid)?.rewarder.clone();
            info!(pool = %pid, old, weight, total = l.registry.total_weight(), "pool weight set");
            j.emit(LedgerEvent::PoolUpdated {
                pool: pid,
                weight,
                rewarder: effective,
                overwrite,
            });
            Ok(())
        })
    }

    /// Change the global emission rate.
    pub fn set_emission_rate(&mut self, caller: &AccountId, rate: u128) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        self.atomically(|l, j| {
            l.sweep_if_configured(j)?;
            j.record_emission_rate(l.emission_rate);
            l.emission_rate = rate;
            info!(rate = %rate, "emission rate set");
            j.emit(LedgerEvent::EmissionRateChanged { rate });
            Ok(())
        })
    }

    /// Install a rewarder implementation that pools can reference by `id`.
    pub fn register_rewarder(
        &mut self,
        caller: &AccountId,
        id: RewarderId,
        rewarder: Box<dyn Rewarder>,
    ) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        if self.rewarders.contains_key(&id) {
            return Err(LedgerError::DuplicateRewarder(id));
        }
        info!(rewarder = %id, "rewarder registered");
        self.rewarders.insert(id.clone(), rewarder);
        self.events.push(LedgerEvent::RewarderRegistered { rewarder: id });
        Ok(())
    }

    /// Install or clear the migrator used by [`migrate`](Self::migrate).
    pub fn set_migrator(
        &mut self,
        caller: &AccountId,
        migrator: Option<Box<dyn Migrator>>,
    ) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        let installed = migrator.is_some();
        self.migrator = migrator;
        info!(installed, "migrator changed");
        self.events.push(LedgerEvent::MigratorChanged { installed });
        Ok(())
    }

    /// Hand administration to `new_admin`.
    pub fn transfer_admin(&mut self, caller: &AccountId, new_admin: AccountId) -> Result<(), LedgerError> {
        self.ensure_admin(caller)?;
        self.atomically(|l, j| {
            j.record_admin(&l.config.admin);
            let previous = std::mem::replace(&mut l.config.admin, new_admin.clone());
            info!(previous = %previous, admin = %new_admin, "admin transferred");
            j.emit(LedgerEvent::AdminTransferred {
                previous,
                admin: new_admin,
            });
            Ok(())
        })
    }

    /// Overwrite the tracked total weight without touching any pool.
    #[cfg(any(test, feature = "testing"))]
    pub fn force_total_weight(&mut self, total_weight: u64) {
        self.registry.set_total_weight(total_weight);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emission(&self) -> Emission {
        Emission {
            rate: self.emission_rate,
            total_weight: self.registry.total_weight(),
        }
    }

    fn ensure_admin(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if *caller != self.config.admin {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn check_rewarder(&self, rewarder: Option<&RewarderId>) -> Result<(), LedgerError> {
        match rewarder {
            Some(id) if !self.rewarders.contains_key(id) => {
                Err(LedgerError::UnknownRewarder(id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Run `op` as one all-or-nothing unit.
    pub(crate) fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self, &mut Journal) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let checkpoint = self.assets.checkpoint();
        let mut journal = Journal::default();
        match op(self, &mut journal) {
            Ok(value) => {
                self.assets.release(checkpoint);
                self.events.append(&mut journal.events);
                Ok(value)
            }
            Err(cause) => {
                let rolled_back = self.assets.rollback(checkpoint);
                self.restore(journal);
                match rolled_back {
                    Ok(()) => {
                        debug!(error = %cause, "operation aborted, state restored");
                        Err(cause)
                    }
                    Err(rollback) => Err(LedgerError::RollbackFailed {
                        cause: Box::new(cause),
                        rollback,
                    }),
                }
            }
        }
    }

    fn restore(&mut self, journal: Journal) {
        for (key, previous) in journal.positions {
            self.positions.restore(key, previous);
        }
        for (pid, pool) in journal.pools {
            self.registry.restore(pid, pool);
        }
        if let Some(len) = journal.pool_count {
            self.registry.truncate(len);
        }
        if let Some(total) = journal.total_weight {
            self.registry.set_total_weight(total);
        }
        if let Some(rate) = journal.emission_rate {
            self.emission_rate = rate;
        }
        if let Some(admin) = journal.admin {
            self.config.admin = admin;
        }
    }

    pub(crate) fn pool_for_update(
        &mut self,
        j: &mut Journal,
        pid: PoolId,
    ) -> Result<&mut Pool, LedgerError> {
        j.record_pool(pid, self.registry.get(pid)?);
        self.registry.get_mut(pid)
    }

    fn store_position(&mut self, j: &mut Journal, pid: PoolId, user: &AccountId, position: Position) {
        let key = (pid, user.clone());
        j.record_position(&key, self.positions.lookup(&key));
        self.positions.put(pid, user.clone(), position);
    }

    pub(crate) fn accrue_in(&mut self, j: &mut Journal, pid: PoolId) -> Result<Pool, LedgerError> {
        let now = self.clock.now();
        let pool = self.registry.get(pid)?;
        if now <= pool.last_accrual_time {
            return Ok(pool.clone());
        }
        let supply = self.assets.balance_of(&pool.collateral, &self.config.custody)?;
        let mut updated = pool.clone();
        accrual::accrue(&mut updated, now, supply, self.emission())?;
        *self.pool_for_update(j, pid)? = updated.clone();

        debug!(pool = %pid, now, supply = %supply, acc = %updated.acc_reward_per_share, "accrued");
        j.emit(LedgerEvent::Accrued {
            pool: pid,
            last_accrual_time: updated.last_accrual_time,
            supply,
            acc_reward_per_share: updated.acc_reward_per_share,
        });
        Ok(updated)
    }

    fn sweep_in(&mut self, j: &mut Journal) -> Result<(), LedgerError> {
        for pid in self.registry.ids() {
            self.accrue_in(j, pid)?;
        }
        Ok(())
    }

    fn sweep_if_configured(&mut self, j: &mut Journal) -> Result<(), LedgerError> {
        match self.config.accrual_policy {
            AccrualPolicy::Lazy => Ok(()),
            AccrualPolicy::SweepOnChange => self.sweep_in(j),
        }
    }

    fn pay_reward(&mut self, to: &AccountId, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        self.assets.transfer(
            &self.config.reward_asset,
            &self.config.reward_vault,
            to,
            amount,
        )?;
        Ok(())
    }

    fn notify(&mut self, pool: &Pool, notice: RewardNotice) -> Result<(), LedgerError> {
        let Some(id) = &pool.rewarder else {
            return Ok(());
        };
        let rewarder = self
            .rewarders
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownRewarder(id.clone()))?;
        rewarder.on_reward(&notice)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tally_core::clock::ManualClock;
    use tally_core::constants::ACC_REWARD_PRECISION;
    use tally_core::error::{AssetError, MathError, RewarderError};

    use crate::memory::MemoryAssets;

    fn acct(s: &str) -> AccountId {
        AccountId::from(s)
    }

    fn lp() -> AssetId {
        AssetId::from("LP")
    }

    struct Fixture {
        ledger: Ledger<MemoryAssets>,
        clock: ManualClock,
        admin: AccountId,
    }

    /// One pool of weight 100, rate 10/s, alice and bob holding 1000 LP each.
    fn fixture() -> Fixture {
        let clock = ManualClock::new(0);
        let config = LedgerConfig {
            emission_rate: 10,
            ..LedgerConfig::default()
        };
        let admin = config.admin.clone();
        let mut assets = MemoryAssets::new();
        assets.mint(&lp(), &acct("alice"), 1_000).unwrap();
        assets.mint(&lp(), &acct("bob"), 1_000).unwrap();
        assets
            .mint(&config.reward_asset, &config.reward_vault, 1_000_000)
            .unwrap();
        let mut ledger = Ledger::new(config, assets, Arc::new(clock.clone()));
        ledger.add_pool(&admin, 100, lp(), None).unwrap();
        ledger.drain_events();
        Fixture { ledger, clock, admin }
    }

    fn reward_balance(l: &Ledger<MemoryAssets>, who: &str) -> u128 {
        l.assets().balance(&l.config().reward_asset, &acct(who))
    }

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<RewardNotice>>>,
        fail: bool,
    }

    impl Rewarder for Recorder {
        fn on_reward(&mut self, notice: &RewardNotice) -> Result<(), RewarderError> {
            if self.fail {
                return Err(RewarderError::Rejected("nope".into()));
            }
            self.seen.lock().push(notice.clone());
            Ok(())
        }
    }

    #[test]
    fn two_depositor_scenario() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let (a, b) = (acct("alice"), acct("bob"));
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.deposit(&b, PoolId(0), 100, &b).unwrap();
        assert_eq!(ledger.pool(PoolId(0)).unwrap().acc_reward_per_share, ACC_REWARD_PRECISION);
        clock.set(20);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 150);
        assert_eq!(ledger.pending_reward(PoolId(0), &b).unwrap(), 50);
        assert_eq!(ledger.harvest(&a, PoolId(0), &a).unwrap(), 150);
        assert_eq!(ledger.harvest(&b, PoolId(0), &b).unwrap(), 50);
        assert_eq!(reward_balance(&ledger, "alice"), 150);
        assert_eq!(reward_balance(&ledger, "bob"), 50);
    }

    #[test]
    fn deposit_does_not_earn_retroactively() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(1_000);
        let b = acct("bob");
        ledger.deposit(&b, PoolId(0), 500, &b).unwrap();
        assert_eq!(ledger.pending_reward(PoolId(0), &b).unwrap(), 0);
    }

    #[test]
    fn deposit_on_behalf_credits_recipient() {
        let Fixture { mut ledger, .. } = fixture();
        let (a, c) = (acct("alice"), acct("carol"));
        ledger.deposit(&a, PoolId(0), 40, &c).unwrap();
        assert_eq!(ledger.position(PoolId(0), &c).amount, 40);
        assert_eq!(ledger.position(PoolId(0), &a).amount, 0);
        assert_eq!(ledger.assets().balance(&lp(), &a), 960);
    }

    #[test]
    fn withdraw_keeps_reward_pending() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.withdraw(&a, PoolId(0), 100, &a).unwrap();
        assert_eq!(ledger.position(PoolId(0), &a).amount, 0);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 100);
        assert_eq!(ledger.assets().balance(&lp(), &a), 1_000);
    }

    #[test]
    fn over_withdraw_is_rejected_without_state_change() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        let before_pool = ledger.pool(PoolId(0)).unwrap().clone();
        ledger.drain_events();
        let err = ledger.withdraw(&a, PoolId(0), 101, &a).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientPosition { pool: PoolId(0), have: 100, need: 101 }
        );
        assert_eq!(ledger.pool(PoolId(0)).unwrap(), &before_pool);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn failed_collateral_pull_rolls_back_everything() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let (a, b) = (acct("alice"), acct("bob"));
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.drain_events();
        let before = ledger.snapshot().unwrap();
        let err = ledger.deposit(&b, PoolId(0), 5_000, &b).unwrap_err();
        assert!(matches!(err, LedgerError::Asset(AssetError::InsufficientBalance { .. })));
        assert_eq!(ledger.snapshot().unwrap(), before);
        assert_eq!(ledger.pool(PoolId(0)).unwrap().last_accrual_time, 0);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn harvest_with_nothing_pending_skips_reward_transfer() {
        let Fixture { mut ledger, .. } = fixture();
        let a = acct("alice");
        let reward = ledger.config().reward_asset.clone();
        ledger.assets_mut().freeze(&reward);
        assert_eq!(ledger.harvest(&a, PoolId(0), &a).unwrap(), 0);
    }

    #[test]
    fn harvest_with_poisoned_reward_fails_atomically() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        let reward = ledger.config().reward_asset.clone();
        ledger.assets_mut().freeze(&reward);
        let err = ledger.harvest(&a, PoolId(0), &a).unwrap_err();
        assert_eq!(err, LedgerError::Asset(AssetError::Frozen(reward)));
        assert_eq!(ledger.position(PoolId(0), &a).debt, 0);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 100);
    }

    #[test]
    fn withdraw_and_harvest_pays_both() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        assert_eq!(ledger.withdraw_and_harvest(&a, PoolId(0), 60, &a).unwrap(), 100);
        assert_eq!(ledger.position(PoolId(0), &a), Position { amount: 40, debt: 40 });
        assert_eq!(ledger.assets().balance(&lp(), &a), 960);
        assert_eq!(reward_balance(&ledger, "alice"), 100);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 0);
    }

    #[test]
    fn emergency_withdraw_forfeits_reward() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        assert_eq!(ledger.emergency_withdraw(&a, PoolId(0), &a).unwrap(), 100);
        assert_eq!(ledger.position(PoolId(0), &a), Position::default());
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 0);
        assert_eq!(ledger.assets().balance(&lp(), &a), 1_000);
        assert_eq!(reward_balance(&ledger, "alice"), 0);
    }

    #[test]
    fn emergency_withdraw_survives_corrupt_weight_and_broken_rewarder() {
        let Fixture { mut ledger, clock, admin } = fixture();
        let a = acct("alice");
        let broken = Recorder { fail: true, ..Recorder::default() };
        ledger
            .register_rewarder(&admin, RewarderId::from("broken"), Box::new(broken))
            .unwrap();
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        ledger
            .set_pool(&admin, PoolId(0), 100, Some(RewarderId::from("broken")), true)
            .unwrap();
        ledger.force_total_weight(0);
        let reward = ledger.config().reward_asset.clone();
        ledger.assets_mut().freeze(&reward);
        clock.set(50);

        assert!(matches!(
            ledger.accrue(PoolId(0)),
            Err(LedgerError::Math(MathError::ZeroTotalWeight { weight: 100 }))
        ));
        assert_eq!(ledger.emergency_withdraw(&a, PoolId(0), &a).unwrap(), 100);
        assert_eq!(ledger.assets().balance(&lp(), &a), 1_000);
    }

    #[test]
    fn rewarder_sees_every_operation() {
        let Fixture { mut ledger, clock, admin } = fixture();
        let rec = Recorder::default();
        let seen = rec.seen.clone();
        ledger
            .register_rewarder(&admin, RewarderId::from("rec"), Box::new(rec))
            .unwrap();
        ledger
            .set_pool(&admin, PoolId(0), 100, Some(RewarderId::from("rec")), true)
            .unwrap();
        let (a, b) = (acct("alice"), acct("bob"));
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.harvest(&a, PoolId(0), &b).unwrap();
        ledger.withdraw(&a, PoolId(0), 30, &b).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!((seen[0].reward, seen[0].new_amount), (0, 100));
        assert_eq!((seen[1].reward, seen[1].new_amount), (100, 100));
        assert_eq!(seen[1].recipient, b);
        assert_eq!((seen[2].reward, seen[2].new_amount), (0, 70));
    }

    #[test]
    fn rejecting_rewarder_rolls_back_harvest() {
        let Fixture { mut ledger, clock, admin } = fixture();
        let a = acct("alice");
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        ledger
            .register_rewarder(
                &admin,
                RewarderId::from("broken"),
                Box::new(Recorder { fail: true, ..Recorder::default() }),
            )
            .unwrap();
        ledger
            .set_pool(&admin, PoolId(0), 100, Some(RewarderId::from("broken")), true)
            .unwrap();
        clock.set(10);
        assert!(matches!(
            ledger.harvest(&a, PoolId(0), &a),
            Err(LedgerError::Rewarder(_))
        ));
        assert_eq!(reward_balance(&ledger, "alice"), 0);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 100);
    }

    #[test]
    fn admin_gate() {
        let Fixture { mut ledger, .. } = fixture();
        let mallory = acct("mallory");
        let denied = LedgerError::Unauthorized { caller: mallory.clone() };
        assert_eq!(ledger.add_pool(&mallory, 1, lp(), None).unwrap_err(), denied);
        assert_eq!(ledger.set_pool(&mallory, PoolId(0), 1, None, false).unwrap_err(), denied);
        assert_eq!(ledger.set_emission_rate(&mallory, 1).unwrap_err(), denied);
        assert_eq!(ledger.set_migrator(&mallory, None).unwrap_err(), denied);
        assert_eq!(ledger.transfer_admin(&mallory, mallory.clone()).unwrap_err(), denied);
        assert_eq!(ledger.emission_rate(), 10);
        assert_eq!(ledger.pool_count(), 1);
    }

    #[test]
    fn transfer_admin_moves_the_gate() {
        let Fixture { mut ledger, admin, .. } = fixture();
        let next = acct("next");
        ledger.transfer_admin(&admin, next.clone()).unwrap();
        assert!(ledger.set_emission_rate(&admin, 1).is_err());
        ledger.set_emission_rate(&next, 1).unwrap();
        assert_eq!(ledger.admin(), &next);
    }

    #[test]
    fn unknown_rewarder_is_rejected() {
        let Fixture { mut ledger, admin, .. } = fixture();
        let err = ledger
            .add_pool(&admin, 5, AssetId::from("LP2"), Some(RewarderId::from("ghost")))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownRewarder(RewarderId::from("ghost")));
        assert_eq!(ledger.pool_count(), 1);
        assert_eq!(ledger.total_weight(), 100);
    }

    #[test]
    fn set_pool_without_overwrite_keeps_rewarder() {
        let Fixture { mut ledger, admin, .. } = fixture();
        ledger
            .register_rewarder(&admin, RewarderId::from("rec"), Box::new(Recorder::default()))
            .unwrap();
        ledger
            .set_pool(&admin, PoolId(0), 100, Some(RewarderId::from("rec")), true)
            .unwrap();
        ledger.set_pool(&admin, PoolId(0), 40, None, false).unwrap();
        let pool = ledger.pool(PoolId(0)).unwrap();
        assert_eq!(pool.weight, 40);
        assert_eq!(pool.rewarder, Some(RewarderId::from("rec")));
        assert_eq!(ledger.total_weight(), 40);
    }

    #[test]
    fn lazy_weight_change_reprices_the_open_period() {
        let Fixture { mut ledger, clock, admin } = fixture();
        let a = acct("alice");
        ledger.add_pool(&admin, 100, AssetId::from("LP2"), None).unwrap();
        // pool 0 now has half the weight; alice's deposit triggers accrual at 0.
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.set_pool(&admin, PoolId(1), 0, None, false).unwrap();
        // The whole 0..10 stretch is priced at the new 100/100 split.
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 100);
    }

    #[test]
    fn sweeping_weight_change_prices_each_period_separately() {
        let clock = ManualClock::new(0);
        let config = LedgerConfig {
            emission_rate: 10,
            accrual_policy: AccrualPolicy::SweepOnChange,
            ..LedgerConfig::default()
        };
        let admin = config.admin.clone();
        let a = acct("alice");
        let mut assets = MemoryAssets::new();
        assets.mint(&lp(), &a, 100).unwrap();
        let mut ledger = Ledger::new(config, assets, Arc::new(clock.clone()));
        ledger.add_pool(&admin, 100, lp(), None).unwrap();
        ledger.add_pool(&admin, 100, AssetId::from("LP2"), None).unwrap();
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(10);
        ledger.set_pool(&admin, PoolId(1), 0, None, false).unwrap();
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 50);
        clock.set(20);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 150);
    }

    #[test]
    fn weight_zero_pool_never_accrues() {
        let Fixture { mut ledger, clock, admin } = fixture();
        let a = acct("alice");
        ledger.set_pool(&admin, PoolId(0), 0, None, false).unwrap();
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        clock.set(100_000);
        ledger.accrue(PoolId(0)).unwrap();
        assert_eq!(ledger.pool(PoolId(0)).unwrap().acc_reward_per_share, 0);
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 0);
    }

    #[test]
    fn direct_custody_transfer_dilutes_accrual() {
        let Fixture { mut ledger, clock, .. } = fixture();
        let (a, b) = (acct("alice"), acct("bob"));
        ledger.deposit(&a, PoolId(0), 100, &a).unwrap();
        let custody = ledger.config().custody.clone();
        ledger.assets_mut().transfer(&lp(), &b, &custody, 100).unwrap();
        assert_eq!(ledger.pool_supply(PoolId(0)).unwrap(), 200);
        clock.set(10);
        // 100 reward over 200 units of supply; alice owns half.
        assert_eq!(ledger.pending_reward(PoolId(0), &a).unwrap(), 50);
    }

    #[test]
    fn accrue_emits_event_once_per_instant() {
        let Fixture { mut ledger, clock, .. } = fixture();
        clock.set(5);
        ledger.accrue(PoolId(0)).unwrap();
        ledger.accrue(PoolId(0)).unwrap();
        let events = ledger.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LedgerEvent::Accrued { last_accrual_time: 5, supply: 0, .. }));
    }

    #[test]
    fn accrue_pools_is_all_or_nothing() {
        let Fixture { mut ledger, clock, .. } = fixture();
        clock.set(5);
        assert_eq!(
            ledger.accrue_pools(&[PoolId(0), PoolId(9)]).unwrap_err(),
            LedgerError::UnknownPool(PoolId(9))
        );
        assert_eq!(ledger.pool(PoolId(0)).unwrap().last_accrual_time, 0);
        ledger.accrue_all().unwrap();
        assert_eq!(ledger.pool(PoolId(0)).unwrap().last_accrual_time, 5);
    }

    #[test]
    fn duplicate_rewarder_rejected() {
        let Fixture { mut ledger, admin, .. } = fixture();
        let id = RewarderId::from("r");
        ledger.register_rewarder(&admin, id.clone(), Box::new(Recorder::default())).unwrap();
        assert_eq!(
            ledger
                .register_rewarder(&admin, id.clone(), Box::new(Recorder::default()))
                .unwrap_err(),
            LedgerError::DuplicateRewarder(id)
        );
    }
}

//! Shared fixtures for the integration tests.

use std::sync::Arc;

use parking_lot::Mutex;

use tally_core::clock::ManualClock;
use tally_core::error::{MigrationError, RewarderError};
use tally_core::traits::{AssetLedger, Migrator, Rewarder};
use tally_core::types::{AccountId, AssetId, MigrationRequest, PoolId, RewardNotice, RewarderId};
use tally_ledger::{AccrualPolicy, Ledger, LedgerConfig, MemoryAssets};

/// Reward units minted into the vault of every [`World`].
pub const REWARD_BUDGET: u128 = 1_000_000_000_000_000;

pub fn acct(name: &str) -> AccountId {
    AccountId::from(name)
}

pub fn asset(name: &str) -> AssetId {
    AssetId::from(name)
}

/// A ledger over in-memory assets with a manual clock starting at 0.
pub struct World {
    pub ledger: Ledger<MemoryAssets>,
    pub clock: ManualClock,
    pub admin: AccountId,
}

impl World {
    pub fn new(rate: u128) -> Self {
        Self::with_policy(rate, AccrualPolicy::Lazy)
    }

    pub fn with_policy(rate: u128, accrual_policy: AccrualPolicy) -> Self {
        Self::with_config(LedgerConfig {
            emission_rate: rate,
            accrual_policy,
            ..LedgerConfig::default()
        })
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let clock = ManualClock::new(0);
        let admin = config.admin.clone();
        let mut assets = MemoryAssets::new();
        assets
            .mint(&config.reward_asset, &config.reward_vault, REWARD_BUDGET)
            .unwrap();
        let ledger = Ledger::new(config, assets, Arc::new(clock.clone()));
        Self { ledger, clock, admin }
    }

    /// Mint `amount` of `asset` to `holder`.
    pub fn fund(&mut self, holder: &str, asset_name: &str, amount: u128) {
        self.ledger
            .assets_mut()
            .mint(&asset(asset_name), &acct(holder), amount)
            .unwrap();
    }

    pub fn add_pool(&mut self, weight: u64, collateral: &str) -> PoolId {
        let admin = self.admin.clone();
        self.ledger
            .add_pool(&admin, weight, asset(collateral), None)
            .unwrap()
    }

    pub fn add_pool_with(&mut self, weight: u64, collateral: &str, rewarder: &str) -> PoolId {
        let admin = self.admin.clone();
        self.ledger
            .add_pool(&admin, weight, asset(collateral), Some(RewarderId::from(rewarder)))
            .unwrap()
    }

    pub fn register(&mut self, id: &str, rewarder: impl Rewarder + 'static) {
        let admin = self.admin.clone();
        self.ledger
            .register_rewarder(&admin, RewarderId::from(id), Box::new(rewarder))
            .unwrap();
    }

    /// Move the clock to `t`.
    pub fn at(&self, t: u64) {
        self.clock.set(t);
    }

    pub fn deposit(&mut self, user: &str, pid: PoolId, amount: u128) {
        let user = acct(user);
        self.ledger.deposit(&user, pid, amount, &user).unwrap();
    }

    pub fn harvest(&mut self, user: &str, pid: PoolId) -> u128 {
        let user = acct(user);
        self.ledger.harvest(&user, pid, &user).unwrap()
    }

    pub fn pending(&self, user: &str, pid: PoolId) -> u128 {
        self.ledger.pending_reward(pid, &acct(user)).unwrap()
    }

    /// Reward asset balance of `holder`.
    pub fn reward_of(&self, holder: &str) -> u128 {
        let reward = &self.ledger.config().reward_asset;
        self.ledger.assets().balance(reward, &acct(holder))
    }

    pub fn balance(&self, holder: &str, asset_name: &str) -> u128 {
        self.ledger.assets().balance(&asset(asset_name), &acct(holder))
    }

    pub fn custody(&self, asset_name: &str) -> u128 {
        let custody = &self.ledger.config().custody;
        self.ledger.assets().balance(&asset(asset_name), custody)
    }

    pub fn vault(&self) -> u128 {
        let config = self.ledger.config();
        self.ledger.assets().balance(&config.reward_asset, &config.reward_vault)
    }

    /// Every non-zero balance, for whole-ledger equality checks.
    pub fn holdings(&self) -> Vec<(AssetId, AccountId, u128)> {
        self.ledger.assets().holdings()
    }
}

/// Records every notice it receives.
#[derive(Clone, Default)]
pub struct RecordingRewarder {
    notices: Arc<Mutex<Vec<RewardNotice>>>,
}

impl RecordingRewarder {
    pub fn notices(&self) -> Vec<RewardNotice> {
        self.notices.lock().clone()
    }
}

impl Rewarder for RecordingRewarder {
    fn on_reward(&mut self, notice: &RewardNotice) -> Result<(), RewarderError> {
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}

/// Rejects every notice.
pub struct FailingRewarder;

impl Rewarder for FailingRewarder {
    fn on_reward(&mut self, _notice: &RewardNotice) -> Result<(), RewarderError> {
        Err(RewarderError::Rejected("rewarder offline".into()))
    }
}

/// Rejects notices that pay a reward. Position-only changes pass.
pub struct RejectHarvests;

impl Rewarder for RejectHarvests {
    fn on_reward(&mut self, notice: &RewardNotice) -> Result<(), RewarderError> {
        if notice.reward > 0 {
            return Err(RewarderError::Rejected(format!(
                "refusing to co-pay {} for {}",
                notice.reward, notice.user
            )));
        }
        Ok(())
    }
}

/// Reports `multiplier` units of `asset` per unit of primary reward.
pub struct BonusRewarder {
    pub asset: AssetId,
    pub multiplier: u128,
}

impl Rewarder for BonusRewarder {
    fn on_reward(&mut self, _notice: &RewardNotice) -> Result<(), RewarderError> {
        Ok(())
    }

    fn pending_tokens(&self, _pool: PoolId, _user: &AccountId, reward: u128) -> Vec<(AssetId, u128)> {
        vec![(self.asset.clone(), reward * self.multiplier)]
    }
}

/// Swaps the custody balance for `to` drawn from `reserve`, short by `shortfall`.
pub struct SwapMigrator {
    pub to: AssetId,
    pub reserve: AccountId,
    pub shortfall: u128,
}

impl Migrator for SwapMigrator {
    fn migrate(
        &mut self,
        assets: &mut dyn AssetLedger,
        request: &MigrationRequest,
    ) -> Result<AssetId, MigrationError> {
        let fail = |e: tally_core::error::AssetError| MigrationError::Failed(e.to_string());
        assets
            .transfer(&request.asset, &request.custody, &self.reserve, request.amount)
            .map_err(fail)?;
        let replacement = request.amount.saturating_sub(self.shortfall);
        assets
            .transfer(&self.to, &self.reserve, &request.custody, replacement)
            .map_err(fail)?;
        Ok(self.to.clone())
    }
}

//! Scenario files and their replay.
//!
//! A scenario is loaded through the `config` crate: the file first (TOML or
//! JSON, chosen by extension), then environment overrides with the `TALLY_`
//! prefix and `__` as the nesting separator (`TALLY_LEDGER__EMISSION_RATE=20`
//! replaces `ledger.emission_rate`).
//!
//! ```toml
//! [ledger]
//! emission_rate = 10
//! reward_budget = 1_000_000
//!
//! [[balances]]
//! holder = "alice"
//! asset = "LP"
//! amount = 100
//!
//! [[steps]]
//! at = 0
//! op = "add_pool"
//! weight = 100
//! collateral = "LP"
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::{debug, warn};

use tally_core::clock::ManualClock;
use tally_core::error::LedgerError;
use tally_core::traits::AssetLedger;
use tally_core::types::{AccountId, AssetId, PoolId};
use tally_ledger::{AccrualPolicy, Ledger, LedgerConfig, MemoryAssets};

use crate::report::{Report, StepReport};

pub const ENV_PREFIX: &str = "TALLY";

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// The `[ledger]` table. Amounts are `u64` here because TOML integers are
/// 64-bit; the ledger itself works in `u128`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub admin: String,
    pub custody: String,
    pub reward_vault: String,
    pub reward_asset: String,
    pub emission_rate: u64,
    pub accrual_policy: AccrualPolicy,
    /// Clock value before the first step.
    pub start: u64,
    /// Reward units minted into the vault before replay.
    pub reward_budget: u64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        let defaults = LedgerConfig::default();
        Self {
            admin: defaults.admin.to_string(),
            custody: defaults.custody.to_string(),
            reward_vault: defaults.reward_vault.to_string(),
            reward_asset: defaults.reward_asset.to_string(),
            emission_rate: 0,
            accrual_policy: defaults.accrual_policy,
            start: 0,
            reward_budget: 0,
        }
    }
}

impl LedgerSection {
    pub fn to_config(&self) -> LedgerConfig {
        LedgerConfig {
            admin: AccountId::new(self.admin.as_str()),
            custody: AccountId::new(self.custody.as_str()),
            reward_vault: AccountId::new(self.reward_vault.as_str()),
            reward_asset: AssetId::new(self.reward_asset.as_str()),
            emission_rate: u128::from(self.emission_rate),
            accrual_policy: self.accrual_policy,
        }
    }
}

/// An initial balance minted before replay.
#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub holder: String,
    pub asset: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Absolute clock value the step runs at.
    pub at: u64,
    #[serde(flatten)]
    pub op: Op,
}

/// One ledger operation. Admin operations default `caller` to the
/// configured admin; position operations default `to` to `user`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    AddPool {
        weight: u64,
        collateral: String,
        caller: Option<String>,
    },
    SetPool {
        pool: u32,
        weight: u64,
        caller: Option<String>,
    },
    SetRate {
        rate: u64,
        caller: Option<String>,
    },
    Deposit {
        user: String,
        pool: u32,
        amount: u64,
        to: Option<String>,
    },
    Withdraw {
        user: String,
        pool: u32,
        amount: u64,
        to: Option<String>,
    },
    Harvest {
        user: String,
        pool: u32,
        to: Option<String>,
    },
    WithdrawAndHarvest {
        user: String,
        pool: u32,
        amount: u64,
        to: Option<String>,
    },
    EmergencyWithdraw {
        user: String,
        pool: u32,
        to: Option<String>,
    },
    /// Accrue one pool, or every pool when `pool` is omitted.
    Accrue { pool: Option<u32> },
    /// Move collateral straight into custody without opening a position.
    TransferIn {
        from: String,
        asset: String,
        amount: u64,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::AddPool { .. } => "add_pool",
            Op::SetPool { .. } => "set_pool",
            Op::SetRate { .. } => "set_rate",
            Op::Deposit { .. } => "deposit",
            Op::Withdraw { .. } => "withdraw",
            Op::Harvest { .. } => "harvest",
            Op::WithdrawAndHarvest { .. } => "withdraw_and_harvest",
            Op::EmergencyWithdraw { .. } => "emergency_withdraw",
            Op::Accrue { .. } => "accrue",
            Op::TransferIn { .. } => "transfer_in",
        }
    }

    fn pool(&self) -> Option<u32> {
        match self {
            Op::SetPool { pool, .. }
            | Op::Deposit { pool, .. }
            | Op::Withdraw { pool, .. }
            | Op::Harvest { pool, .. }
            | Op::WithdrawAndHarvest { pool, .. }
            | Op::EmergencyWithdraw { pool, .. } => Some(*pool),
            Op::Accrue { pool } => *pool,
            Op::AddPool { .. } | Op::SetRate { .. } | Op::TransferIn { .. } => None,
        }
    }
}

impl Scenario {
    /// Read a scenario file, applying `TALLY_*` environment overrides.
    ///
    /// The format follows the extension (`.toml`, `.json`).
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Static checks: steps are in time order and every pool a step names
    /// has been added by an earlier step.
    pub fn validate(&self) -> Result<()> {
        let mut now = self.ledger.start;
        let mut pools = 0u32;
        for (i, step) in self.steps.iter().enumerate() {
            if step.at < now {
                bail!(
                    "step {i} ({}) runs at {} which is before the previous step at {now}",
                    step.op.name(),
                    step.at
                );
            }
            now = step.at;
            if let Some(pool) = step.op.pool() {
                if pool >= pools {
                    bail!(
                        "step {i} ({}) names pool {pool} but only {pools} pool(s) exist by then",
                        step.op.name()
                    );
                }
            }
            if matches!(step.op, Op::AddPool { .. }) {
                pools += 1;
            }
        }
        Ok(())
    }

    /// Replay every step against a fresh in-memory ledger.
    ///
    /// Failing steps are recorded in the report; with `strict` the first one
    /// aborts the replay instead.
    pub fn replay(&self, strict: bool) -> Result<Report> {
        let config = self.ledger.to_config();
        let clock = ManualClock::new(self.ledger.start);
        let mut assets = MemoryAssets::new();
        if self.ledger.reward_budget > 0 {
            assets
                .mint(
                    &config.reward_asset,
                    &config.reward_vault,
                    u128::from(self.ledger.reward_budget),
                )
                .context("failed to fund the reward vault")?;
        }
        for b in &self.balances {
            assets
                .mint(
                    &AssetId::new(b.asset.as_str()),
                    &AccountId::new(b.holder.as_str()),
                    u128::from(b.amount),
                )
                .with_context(|| format!("failed to mint {} {} to {}", b.amount, b.asset, b.holder))?;
        }

        let mut ledger = Ledger::new(config, assets, Arc::new(clock.clone()));
        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            clock.set(step.at);
            let op = step.op.name();
            match apply(&mut ledger, &step.op) {
                Ok(paid) => {
                    debug!(step = index, op, at = step.at, "step applied");
                    steps.push(StepReport::applied(index, step.at, op, paid));
                }
                Err(e) if strict => {
                    return Err(e)
                        .with_context(|| format!("step {index} ({op}) failed at t={}", step.at));
                }
                Err(e) => {
                    warn!(step = index, op, at = step.at, error = %e, "step failed");
                    steps.push(StepReport::failed(index, step.at, op, &e));
                }
            }
        }

        Ok(Report::build(&mut ledger, steps)?)
    }
}

/// Apply one operation. Returns the reward paid for harvesting operations.
fn apply(ledger: &mut Ledger<MemoryAssets>, op: &Op) -> Result<Option<u128>, LedgerError> {
    let current_admin = ledger.admin().clone();
    let admin = |caller: &Option<String>| {
        caller
            .as_deref()
            .map(AccountId::from)
            .unwrap_or_else(|| current_admin.clone())
    };
    let recipient = |user: &AccountId, to: &Option<String>| {
        to.as_deref().map(AccountId::from).unwrap_or_else(|| user.clone())
    };

    match op {
        Op::AddPool {
            weight,
            collateral,
            caller,
        } => {
            let caller = admin(caller);
            ledger.add_pool(&caller, *weight, AssetId::new(collateral.as_str()), None)?;
            Ok(None)
        }
        Op::SetPool {
            pool,
            weight,
            caller,
        } => {
            let caller = admin(caller);
            ledger.set_pool(&caller, PoolId(*pool), *weight, None, false)?;
            Ok(None)
        }
        Op::SetRate { rate, caller } => {
            let caller = admin(caller);
            ledger.set_emission_rate(&caller, u128::from(*rate))?;
            Ok(None)
        }
        Op::Deposit {
            user,
            pool,
            amount,
            to,
        } => {
            let user = AccountId::new(user.as_str());
            let to = recipient(&user, to);
            ledger.deposit(&user, PoolId(*pool), u128::from(*amount), &to)?;
            Ok(None)
        }
        Op::Withdraw {
            user,
            pool,
            amount,
            to,
        } => {
            let user = AccountId::new(user.as_str());
            let to = recipient(&user, to);
            ledger.withdraw(&user, PoolId(*pool), u128::from(*amount), &to)?;
            Ok(None)
        }
        Op::Harvest { user, pool, to } => {
            let user = AccountId::new(user.as_str());
            let to = recipient(&user, to);
            Ok(Some(ledger.harvest(&user, PoolId(*pool), &to)?))
        }
        Op::WithdrawAndHarvest {
            user,
            pool,
            amount,
            to,
        } => {
            let user = AccountId::new(user.as_str());
            let to = recipient(&user, to);
            Ok(Some(ledger.withdraw_and_harvest(
                &user,
                PoolId(*pool),
                u128::from(*amount),
                &to,
            )?))
        }
        Op::EmergencyWithdraw { user, pool, to } => {
            let user = AccountId::new(user.as_str());
            let to = recipient(&user, to);
            ledger.emergency_withdraw(&user, PoolId(*pool), &to)?;
            Ok(None)
        }
        Op::Accrue { pool: Some(pool) } => {
            ledger.accrue(PoolId(*pool))?;
            Ok(None)
        }
        Op::Accrue { pool: None } => {
            ledger.accrue_all()?;
            Ok(None)
        }
        Op::TransferIn {
            from,
            asset,
            amount,
        } => {
            let custody = ledger.config().custody.clone();
            ledger.assets_mut().transfer(
                &AssetId::new(asset.as_str()),
                &AccountId::new(from.as_str()),
                &custody,
                u128::from(*amount),
            )?;
            Ok(None)
        }
    }
}

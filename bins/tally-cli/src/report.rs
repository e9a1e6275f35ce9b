//! Replay report: final ledger state plus a per-step outcome log.

use std::fmt;

use serde::Serialize;

use tally_core::error::LedgerError;
use tally_core::event::LedgerEvent;
use tally_core::types::{AccountId, AssetId, PoolId};
use tally_ledger::{Ledger, MemoryAssets, PositionSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct PoolRow {
    pub pool: PoolId,
    pub weight: u64,
    pub collateral: AssetId,
    pub supply: u128,
    pub acc_reward_per_share: u128,
    pub last_accrual_time: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub holder: AccountId,
    pub amount: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub at: u64,
    pub op: String,
    /// Reward paid, for harvesting operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub fn applied(index: usize, at: u64, op: &str, paid: Option<u128>) -> Self {
        Self {
            index,
            at,
            op: op.to_string(),
            paid,
            error: None,
        }
    }

    pub fn failed(index: usize, at: u64, op: &str, error: &LedgerError) -> Self {
        Self {
            index,
            at,
            op: op.to_string(),
            paid: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub time: u64,
    pub emission_rate: u128,
    pub total_weight: u64,
    pub pools: Vec<PoolRow>,
    pub positions: Vec<PositionSnapshot>,
    /// Reward asset holdings, vault included, sorted by holder.
    pub reward_balances: Vec<Holding>,
    pub steps: Vec<StepReport>,
    pub events: Vec<LedgerEvent>,
}

impl Report {
    /// Capture `ledger`'s final state. Drains its event log.
    pub fn build(
        ledger: &mut Ledger<MemoryAssets>,
        steps: Vec<StepReport>,
    ) -> Result<Self, LedgerError> {
        let snapshot = ledger.snapshot()?;
        let mut pools = Vec::with_capacity(snapshot.pools.len());
        for (pid, pool) in snapshot.pools {
            pools.push(PoolRow {
                pool: pid,
                weight: pool.weight,
                supply: ledger.pool_supply(pid)?,
                collateral: pool.collateral,
                acc_reward_per_share: pool.acc_reward_per_share,
                last_accrual_time: pool.last_accrual_time,
            });
        }
        let reward_asset = ledger.config().reward_asset.clone();
        let reward_balances = ledger
            .assets()
            .holdings()
            .into_iter()
            .filter(|(asset, _, _)| *asset == reward_asset)
            .map(|(_, holder, amount)| Holding { holder, amount })
            .collect();

        Ok(Self {
            time: snapshot.time,
            emission_rate: snapshot.emission_rate,
            total_weight: snapshot.total_weight,
            pools,
            positions: snapshot.positions,
            reward_balances,
            steps,
            events: ledger.drain_events(),
        })
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== LEDGER ===")?;
        writeln!(f, "Time:          {}", self.time)?;
        writeln!(f, "Emission rate: {}/s", self.emission_rate)?;
        writeln!(f, "Total weight:  {}", self.total_weight)?;

        writeln!(f, "\n=== POOLS ===")?;
        for p in &self.pools {
            writeln!(
                f,
                "  {} weight={} collateral={} supply={} acc={} last={}",
                p.pool, p.weight, p.collateral, p.supply, p.acc_reward_per_share, p.last_accrual_time
            )?;
        }

        writeln!(f, "\n=== POSITIONS ===")?;
        for p in &self.positions {
            writeln!(
                f,
                "  {} {} amount={} debt={} pending={}",
                p.pool, p.user, p.amount, p.debt, p.pending
            )?;
        }

        writeln!(f, "\n=== REWARD BALANCES ===")?;
        for h in &self.reward_balances {
            writeln!(f, "  {}: {}", h.holder, h.amount)?;
        }

        writeln!(f, "\n=== STEPS ({} failed) ===", self.failures())?;
        for s in &self.steps {
            write!(f, "  [{}] t={} {}", s.index, s.at, s.op)?;
            if let Some(paid) = s.paid {
                write!(f, " paid={paid}")?;
            }
            match &s.error {
                Some(e) => writeln!(f, " FAILED: {e}")?,
                None => writeln!(f, " ok")?,
            }
        }

        writeln!(f, "\n=== EVENTS ({}) ===", self.events.len())?;
        for e in &self.events {
            match serde_json::to_string(e) {
                Ok(line) => writeln!(f, "  {line}")?,
                Err(_) => writeln!(f, "  {e:?}")?,
            }
        }
        Ok(())
    }
}

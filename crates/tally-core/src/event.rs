//! Observability events emitted by committed ledger operations.
//!
//! Events of an operation that fails are discarded together with its
//! state changes.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, AssetId, PoolId, RewarderId};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    PoolAdded {
        pool: PoolId,
        weight: u64,
        collateral: AssetId,
        rewarder: Option<RewarderId>,
    },
    PoolUpdated {
        pool: PoolId,
        weight: u64,
        rewarder: Option<RewarderId>,
        overwrite: bool,
    },
    EmissionRateChanged {
        rate: u128,
    },
    Accrued {
        pool: PoolId,
        last_accrual_time: u64,
        supply: u128,
        acc_reward_per_share: u128,
    },
    Deposit {
        user: AccountId,
        pool: PoolId,
        amount: u128,
        to: AccountId,
    },
    Withdraw {
        user: AccountId,
        pool: PoolId,
        amount: u128,
        to: AccountId,
    },
    Harvest {
        user: AccountId,
        pool: PoolId,
        amount: u128,
    },
    EmergencyWithdraw {
        user: AccountId,
        pool: PoolId,
        amount: u128,
        to: AccountId,
    },
    RewarderRegistered {
        rewarder: RewarderId,
    },
    MigratorChanged {
        installed: bool,
    },
    Migrated {
        pool: PoolId,
        from: AssetId,
        to: AssetId,
        amount: u128,
    },
    AdminTransferred {
        previous: AccountId,
        admin: AccountId,
    },
}

impl LedgerEvent {
    /// The pool an event concerns, if any.
    pub fn pool(&self) -> Option<PoolId> {
        match self {
            Self::PoolAdded { pool, .. }
            | Self::PoolUpdated { pool, .. }
            | Self::Accrued { pool, .. }
            | Self::Deposit { pool, .. }
            | Self::Withdraw { pool, .. }
            | Self::Harvest { pool, .. }
            | Self::EmergencyWithdraw { pool, .. }
            | Self::Migrated { pool, .. } => Some(*pool),
            Self::EmissionRateChanged { .. }
            | Self::RewarderRegistered { .. }
            | Self::MigratorChanged { .. }
            | Self::AdminTransferred { .. } => None,
        }
    }
}

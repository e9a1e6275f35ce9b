//! Core ledger types: identifiers, pools, positions.
//!
//! All collateral and reward amounts are `u128` in the asset's smallest unit.
//! Timestamps are unix seconds (`u64`).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MathError;
use crate::math;

/// Index of a pool in the registry. Pools are never removed, so ids are stable.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct PoolId(pub u32);

impl PoolId {
    /// Position of this pool in the registry's backing vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// A participant or system account (depositor, recipient, custody, admin).
    AccountId
);
string_id!(
    /// A fungible asset held in the asset ledger (collateral or reward).
    AssetId
);
string_id!(
    /// Name under which a rewarder implementation is registered with a ledger.
    RewarderId
);

/// Accrual state of a single pool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    /// Relative share of the global emission.
    pub weight: u64,
    /// Timestamp of the last accumulator update.
    pub last_accrual_time: u64,
    /// Cumulative reward per unit of collateral, scaled by `ACC_REWARD_PRECISION`.
    pub acc_reward_per_share: u128,
    /// Asset locked in this pool. Replaced only by a successful migration.
    pub collateral: AssetId,
    /// Optional rewarder notified after every position change or harvest.
    pub rewarder: Option<RewarderId>,
}

impl Pool {
    /// A fresh pool whose accumulator starts at zero at `now`.
    pub fn new(weight: u64, collateral: AssetId, rewarder: Option<RewarderId>, now: u64) -> Self {
        Self {
            weight,
            last_accrual_time: now,
            acc_reward_per_share: 0,
            collateral,
            rewarder,
        }
    }
}

/// A participant's locked collateral and reward baseline in one pool.
///
/// `debt` is the reward already accounted for (paid out or forfeited):
/// `pending = amount * acc_reward_per_share / ACC_REWARD_PRECISION - debt`.
/// It is signed because a withdrawal after a harvest pushes it below zero.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Position {
    /// Collateral currently locked.
    pub amount: u128,
    /// Reward baseline snapshot.
    pub debt: i128,
}

impl Position {
    /// Reward entitlement implied by the accumulator for the whole `amount`.
    pub fn accumulated(&self, acc_reward_per_share: u128) -> Result<i128, MathError> {
        math::accumulated(self.amount, acc_reward_per_share)
    }

    /// Reward earned and not yet accounted for.
    pub fn pending(&self, acc_reward_per_share: u128) -> Result<u128, MathError> {
        math::pending(self.accumulated(acc_reward_per_share)?, self.debt)
    }

    /// Whether the position holds no collateral and no baseline.
    pub fn is_empty(&self) -> bool {
        self.amount == 0 && self.debt == 0
    }
}

/// Arguments of a rewarder notification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RewardNotice {
    pub pool: PoolId,
    /// Owner of the position that changed.
    pub user: AccountId,
    /// Account that received the collateral or reward.
    pub recipient: AccountId,
    /// Primary reward realized by this operation (0 for deposit/withdraw).
    pub reward: u128,
    /// The position's amount after the operation.
    pub new_amount: u128,
}

/// What a migrator is asked to move.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MigrationRequest {
    pub pool: PoolId,
    /// Asset currently locked in the pool.
    pub asset: AssetId,
    /// Account holding the collateral; the replacement must land here too.
    pub custody: AccountId,
    /// Custody balance of `asset` before migration.
    pub amount: u128,
}

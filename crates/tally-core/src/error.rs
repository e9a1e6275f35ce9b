//! Error types for the Tally ledger.
use thiserror::Error;

use crate::types::{AccountId, AssetId, PoolId, RewarderId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")] Overflow,
    #[error("division by zero")] DivisionByZero,
    #[error("total weight is zero while pool weight is {weight}")] ZeroTotalWeight { weight: u64 },
    #[error("negative pending reward: accumulated {accumulated} < debt {debt}")] NegativePending { accumulated: i128, debt: i128 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("insufficient {asset} balance for {holder}: have {have}, need {need}")] InsufficientBalance { asset: AssetId, holder: AccountId, have: u128, need: u128 },
    #[error("balance overflow crediting {asset} to {holder}")] BalanceOverflow { asset: AssetId, holder: AccountId },
    #[error("asset {0} is frozen")] Frozen(AssetId),
    #[error("unknown checkpoint {0}")] UnknownCheckpoint(u64),
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewarderError {
    #[error("rewarder rejected notification: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("no migrator configured")] NoMigrator,
    #[error("migrated balance mismatch: expected {expected}, got {got}")] BalanceMismatch { expected: u128, got: u128 },
    #[error("migration failed: {0}")] Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {caller} is not the administrator")] Unauthorized { caller: AccountId },
    #[error("unknown pool {0}")] UnknownPool(PoolId),
    #[error("unknown rewarder {0}")] UnknownRewarder(RewarderId),
    #[error("rewarder {0} already registered")] DuplicateRewarder(RewarderId),
    #[error("withdraw exceeds position in pool {pool}: have {have}, need {need}")] InsufficientPosition { pool: PoolId, have: u128, need: u128 },
    #[error(transparent)] Math(#[from] MathError),
    #[error(transparent)] Asset(#[from] AssetError),
    #[error(transparent)] Rewarder(#[from] RewarderError),
    #[error(transparent)] Migration(#[from] MigrationError),
    #[error("rollback after `{cause}` failed: {rollback}")] RollbackFailed { cause: Box<LedgerError>, rollback: AssetError },
}

impl LedgerError {
    /// Whether the error indicates corrupted configuration rather than a bad request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::Math(MathError::ZeroTotalWeight { .. }) | LedgerError::RollbackFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_variants_keep_inner_message() {
        let e: LedgerError = MathError::Overflow.into();
        assert_eq!(e.to_string(), "arithmetic overflow");
        let e: LedgerError = MigrationError::NoMigrator.into();
        assert_eq!(e.to_string(), "no migrator configured");
    }

    #[test]
    fn zero_total_weight_is_fatal() {
        let e: LedgerError = MathError::ZeroTotalWeight { weight: 5 }.into();
        assert!(e.is_fatal());
        assert!(!LedgerError::UnknownPool(PoolId(0)).is_fatal());
    }

    #[test]
    fn rollback_failure_names_both_errors() {
        let e = LedgerError::RollbackFailed {
            cause: Box::new(RewarderError::Rejected("boom".into()).into()),
            rollback: AssetError::UnknownCheckpoint(3),
        };
        let msg = e.to_string();
        assert!(msg.contains("boom"));
        assert!(msg.contains("unknown checkpoint 3"));
    }
}

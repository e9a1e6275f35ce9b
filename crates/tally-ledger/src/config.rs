//! Ledger configuration.
//!
//! [`LedgerConfig`] names the system accounts, the reward asset, the starting
//! emission rate, and how administrative parameter changes interact with
//! pending accrual.

use serde::{Deserialize, Serialize};

use tally_core::constants::{
    DEFAULT_ADMIN, DEFAULT_CUSTODY_ACCOUNT, DEFAULT_REWARD_ASSET, DEFAULT_REWARD_VAULT,
};
use tally_core::types::{AccountId, AssetId};

/// How weight and emission-rate changes treat the period since each pool's
/// last accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualPolicy {
    /// Parameters change immediately. The stretch since a pool's last accrual
    /// is priced with whatever parameters are in force when it is next touched.
    #[default]
    Lazy,
    /// Every pool is accrued with the old parameters before a change to
    /// pool weights or the emission rate is committed.
    SweepOnChange,
}

/// Configuration for a ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// The only account allowed to call administrative operations.
    pub admin: AccountId,
    /// Account holding every pool's locked collateral.
    pub custody: AccountId,
    /// Account rewards are paid from.
    pub reward_vault: AccountId,
    /// The emitted reward asset.
    pub reward_asset: AssetId,
    /// Reward units emitted per second across all pools.
    pub emission_rate: u128,
    pub accrual_policy: AccrualPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin: AccountId::from(DEFAULT_ADMIN),
            custody: AccountId::from(DEFAULT_CUSTODY_ACCOUNT),
            reward_vault: AccountId::from(DEFAULT_REWARD_VAULT),
            reward_asset: AssetId::from(DEFAULT_REWARD_ASSET),
            emission_rate: 0,
            accrual_policy: AccrualPolicy::Lazy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_lazy() {
        assert_eq!(LedgerConfig::default().accrual_policy, AccrualPolicy::Lazy);
    }

    #[test]
    fn default_accounts() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.custody.as_str(), DEFAULT_CUSTODY_ACCOUNT);
        assert_eq!(cfg.reward_vault.as_str(), DEFAULT_REWARD_VAULT);
        assert_eq!(cfg.admin.as_str(), DEFAULT_ADMIN);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: LedgerConfig =
            serde_json::from_str(r#"{"emission_rate": 10, "accrual_policy": "sweep_on_change"}"#)
                .unwrap();
        assert_eq!(cfg.emission_rate, 10);
        assert_eq!(cfg.accrual_policy, AccrualPolicy::SweepOnChange);
        assert_eq!(cfg.reward_asset.as_str(), DEFAULT_REWARD_ASSET);
    }
}

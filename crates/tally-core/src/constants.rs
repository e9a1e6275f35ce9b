//! Ledger constants.

/// Fixed-point scale for the per-pool reward accumulator.
///
/// `acc_reward_per_share` is stored as `reward_per_unit * ACC_REWARD_PRECISION`.
pub const ACC_REWARD_PRECISION: u128 = 1_000_000_000_000;

/// Default custody account holding every pool's locked collateral.
pub const DEFAULT_CUSTODY_ACCOUNT: &str = "tally:custody";

/// Default account the reward asset is paid out from.
pub const DEFAULT_REWARD_VAULT: &str = "tally:rewards";

/// Default administrator account.
pub const DEFAULT_ADMIN: &str = "tally:admin";

/// Default reward asset identifier.
pub const DEFAULT_REWARD_ASSET: &str = "REWARD";

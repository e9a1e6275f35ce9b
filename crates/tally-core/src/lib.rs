//! # tally-core
//! Foundation types and traits for the Tally reward ledger.
//!
//! All accounting is integer-only. Fractional "reward per unit of collateral"
//! values are carried as integers scaled by
//! [`ACC_REWARD_PRECISION`](constants::ACC_REWARD_PRECISION).

pub mod clock;
pub mod constants;
pub mod error;
pub mod event;
pub mod math;
pub mod traits;
pub mod types;

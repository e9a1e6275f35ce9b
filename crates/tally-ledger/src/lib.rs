//! # tally-ledger: Time-weighted multi-pool reward accrual.
//!
//! Participants lock collateral into weighted pools and earn a share of a
//! globally emitted reward asset. The engine keeps, per pool, a monotonically
//! increasing reward-per-share accumulator updated lazily on each touch, and
//! per position a debt baseline, so pending rewards cost O(1) to compute.
//!
//! - [`accrual`]: the lazy per-pool accumulator update
//! - [`positions`]: position balance/debt transitions
//! - [`registry`]: pools and total weight
//! - [`ledger`]: the operation surface with all-or-nothing execution
//! - [`memory`]: an in-memory journaled [`AssetLedger`](tally_core::traits::AssetLedger)
//! - [`shared`]: a single-writer, multi-reader handle

pub mod accrual;
pub mod config;
mod journal;
pub mod ledger;
pub mod memory;
mod migration;
pub mod positions;
pub mod registry;
pub mod shared;

pub use config::{AccrualPolicy, LedgerConfig};
pub use ledger::{Ledger, LedgerSnapshot, PositionSnapshot};
pub use memory::MemoryAssets;
pub use shared::SharedLedger;

//! Integration test suite for the Tally reward ledger.
//!
//! The tests under `tests/` drive a full [`Ledger`](tally_ledger::Ledger)
//! over [`MemoryAssets`](tally_ledger::MemoryAssets) through whole operation
//! sequences, including failing collaborators, and check the accounting
//! properties that must hold across them.

pub mod helpers;

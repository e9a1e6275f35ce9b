//! In-memory journaled asset ledger.
//!
//! [`MemoryAssets`] keeps balances in a `HashMap` and records every balance
//! change made while a checkpoint is open, so a failed ledger operation can
//! be undone exactly. Suitable for tests, simulation, and the CLI.

use std::collections::{HashMap, HashSet};

use tally_core::error::AssetError;
use tally_core::traits::{AssetLedger, Checkpoint};
use tally_core::types::{AccountId, AssetId};

/// A journaled balance change.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Entry {
    Mint {
        asset: AssetId,
        to: AccountId,
        amount: u128,
    },
    Transfer {
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    balances: HashMap<(AssetId, AccountId), u128>,
    frozen: HashSet<AssetId>,
    journal: Vec<Entry>,
    /// Journal length at each open checkpoint, innermost last.
    open: Vec<usize>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `asset` out of thin air for `to`.
    pub fn mint(&mut self, asset: &AssetId, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        self.credit(asset, to, amount)?;
        self.log(Entry::Mint {
            asset: asset.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Make every transfer of `asset` fail until [`unfreeze`](Self::unfreeze).
    pub fn freeze(&mut self, asset: &AssetId) {
        self.frozen.insert(asset.clone());
    }

    pub fn unfreeze(&mut self, asset: &AssetId) {
        self.frozen.remove(asset);
    }

    /// Balance lookup that cannot fail.
    pub fn balance(&self, asset: &AssetId, holder: &AccountId) -> u128 {
        self.balances
            .get(&(asset.clone(), holder.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of every holder's balance of `asset`.
    pub fn total_supply(&self, asset: &AssetId) -> u128 {
        self.balances
            .iter()
            .filter(|((a, _), _)| a == asset)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Every non-zero balance, sorted by (asset, holder).
    pub fn holdings(&self) -> Vec<(AssetId, AccountId, u128)> {
        let mut out: Vec<_> = self
            .balances
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|((a, h), v)| (a.clone(), h.clone(), *v))
            .collect();
        out.sort();
        out
    }

    /// Number of open checkpoints.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn log(&mut self, entry: Entry) {
        if !self.open.is_empty() {
            self.journal.push(entry);
        }
    }

    fn credit(&mut self, asset: &AssetId, to: &AccountId, amount: u128) -> Result<(), AssetError> {
        let slot = self.balances.entry((asset.clone(), to.clone())).or_insert(0);
        *slot = slot.checked_add(amount).ok_or_else(|| AssetError::BalanceOverflow {
            asset: asset.clone(),
            holder: to.clone(),
        })?;
        Ok(())
    }

    fn debit(&mut self, asset: &AssetId, from: &AccountId, amount: u128) -> Result<(), AssetError> {
        let have = self.balance(asset, from);
        let left = have.checked_sub(amount).ok_or_else(|| AssetError::InsufficientBalance {
            asset: asset.clone(),
            holder: from.clone(),
            have,
            need: amount,
        })?;
        self.balances.insert((asset.clone(), from.clone()), left);
        Ok(())
    }

    /// Unconditional move used by transfers and by rollback.
    fn shift(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), AssetError> {
        if from == to {
            // Still enforce the balance requirement.
            let have = self.balance(asset, from);
            if have < amount {
                return Err(AssetError::InsufficientBalance {
                    asset: asset.clone(),
                    holder: from.clone(),
                    have,
                    need: amount,
                });
            }
            return Ok(());
        }
        // Check the credit side first so a failure leaves no effect.
        let to_balance = self.balance(asset, to);
        if to_balance.checked_add(amount).is_none() {
            return Err(AssetError::BalanceOverflow {
                asset: asset.clone(),
                holder: to.clone(),
            });
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }
}

impl AssetLedger for MemoryAssets {
    fn balance_of(&self, asset: &AssetId, holder: &AccountId) -> Result<u128, AssetError> {
        Ok(self.balance(asset, holder))
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), AssetError> {
        if self.frozen.contains(asset) {
            return Err(AssetError::Frozen(asset.clone()));
        }
        self.shift(asset, from, to, amount)?;
        self.log(Entry::Transfer {
            asset: asset.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.open.push(self.journal.len());
        Checkpoint(self.open.len() as u64 - 1)
    }

    fn rollback(&mut self, checkpoint: Checkpoint) -> Result<(), AssetError> {
        if checkpoint.0 as usize + 1 != self.open.len() {
            return Err(AssetError::UnknownCheckpoint(checkpoint.0));
        }
        let start = self.open.pop().unwrap_or(0);
        while self.journal.len() > start {
            let Some(entry) = self.journal.pop() else { break };
            match entry {
                Entry::Mint { asset, to, amount } => self.debit(&asset, &to, amount)?,
                Entry::Transfer {
                    asset,
                    from,
                    to,
                    amount,
                } => self.shift(&asset, &to, &from, amount)?,
            }
        }
        if self.open.is_empty() {
            self.journal.clear();
        }
        Ok(())
    }

    fn release(&mut self, checkpoint: Checkpoint) {
        if checkpoint.0 as usize + 1 == self.open.len() {
            self.open.pop();
        }
        if self.open.is_empty() {
            self.journal.clear();
        }
    }
}

//! One-shot collateral migration.
//!
//! Anyone may trigger a migration once the administrator has installed a
//! migrator. The migrator moves the pool's whole custody balance out and must
//! leave exactly the same balance of the replacement asset in custody;
//! anything else rolls the migration back.

use tracing::info;

use tally_core::error::{LedgerError, MigrationError};
use tally_core::event::LedgerEvent;
use tally_core::traits::{AssetLedger, Migrator};
use tally_core::types::{AssetId, MigrationRequest, PoolId};

use crate::journal::Journal;
use crate::ledger::Ledger;

impl<A: AssetLedger> Ledger<A> {
    /// Replace `pid`'s collateral asset through the installed migrator.
    ///
    /// Returns the new collateral asset.
    pub fn migrate(&mut self, pid: PoolId) -> Result<AssetId, LedgerError> {
        let mut migrator = self.migrator.take().ok_or(MigrationError::NoMigrator)?;
        let result = self.atomically(|l, j| l.migrate_in(j, pid, migrator.as_mut()));
        self.migrator = Some(migrator);
        result
    }

    fn migrate_in(
        &mut self,
        j: &mut Journal,
        pid: PoolId,
        migrator: &mut dyn Migrator,
    ) -> Result<AssetId, LedgerError> {
        let custody = self.config().custody.clone();
        let old = self.pool(pid)?.collateral.clone();
        let balance = self.assets.balance_of(&old, &custody)?;
        let request = MigrationRequest {
            pool: pid,
            asset: old.clone(),
            custody: custody.clone(),
            amount: balance,
        };

        let new = migrator.migrate(&mut self.assets, &request)?;
        let migrated = self.assets.balance_of(&new, &custody)?;
        if migrated != balance {
            return Err(MigrationError::BalanceMismatch {
                expected: balance,
                got: migrated,
            }
            .into());
        }

        self.pool_for_update(j, pid)?.collateral = new.clone();
        info!(pool = %pid, from = %old, to = %new, amount = %balance, "collateral migrated");
        j.emit(LedgerEvent::Migrated {
            pool: pid,
            from: old,
            to: new.clone(),
            amount: balance,
        });
        Ok(new)
    }
}

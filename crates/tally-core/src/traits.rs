//! Collaborator interfaces for the Tally ledger.
//!
//! These traits define the boundary between the accounting engine and the
//! outside world:
//! - [`AssetLedger`]: balances and transfers of collateral and reward assets
//! - [`Rewarder`]: optional per-pool secondary notification target
//! - [`Migrator`]: one-shot replacement of a pool's collateral asset
//! - [`Clock`]: source of the current instant

use crate::error::{AssetError, MigrationError, RewarderError};
use crate::types::{AccountId, AssetId, MigrationRequest, PoolId, RewardNotice};

/// Opaque marker returned by [`AssetLedger::checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Checkpoint(pub u64);

/// Fungible asset balances with journaled transfers.
///
/// The ledger opens a checkpoint before every operation. Every transfer
/// after it must be revertible by [`rollback`](Self::rollback) until the
/// checkpoint is [`release`](Self::release)d. Checkpoints nest.
pub trait AssetLedger: Send + Sync {
    /// Current balance of `asset` held by `holder`.
    fn balance_of(&self, asset: &AssetId, holder: &AccountId) -> Result<u128, AssetError>;

    /// Move `amount` of `asset` from `from` to `to`. Fails without effect.
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), AssetError>;

    /// Open a new rollback point.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Revert every transfer made since `checkpoint` and close it.
    fn rollback(&mut self, checkpoint: Checkpoint) -> Result<(), AssetError>;

    /// Keep every transfer made since `checkpoint` and close it.
    fn release(&mut self, checkpoint: Checkpoint);
}

/// Secondary reward plug-in attached to a pool.
///
/// The ledger calls [`on_reward`](Self::on_reward) last in each operation,
/// after its own state and all transfers are final. An error aborts and
/// rolls back the whole operation, except during emergency withdraw where
/// it is ignored. Implementations must not keep partial effects when they
/// return an error.
pub trait Rewarder: Send + Sync {
    /// Notification that a position changed or was harvested.
    fn on_reward(&mut self, notice: &RewardNotice) -> Result<(), RewarderError>;

    /// Secondary rewards `user` would receive alongside `reward` of the primary asset.
    ///
    /// Default implementation: no secondary rewards.
    fn pending_tokens(&self, _pool: PoolId, _user: &AccountId, _reward: u128) -> Vec<(AssetId, u128)> {
        Vec::new()
    }
}

/// Replaces a pool's collateral asset with an equal balance of another asset.
pub trait Migrator: Send + Sync {
    /// Move `request.amount` of `request.asset` out of custody and leave the
    /// same amount of the returned asset in custody.
    ///
    /// The ledger re-checks the custody balance of the returned asset and
    /// rolls back every transfer if it differs from `request.amount`.
    fn migrate(
        &mut self,
        assets: &mut dyn AssetLedger,
        request: &MigrationRequest,
    ) -> Result<AssetId, MigrationError>;
}

/// Source of the current time, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

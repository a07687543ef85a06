use async_trait::async_trait;

use crate::error::Error;
use crate::models::{FollowKey, FollowRecord, GamePhase};

/// Durable registry of which channel follows which game, and what each
/// channel was last told about it.
///
/// Every mutating call must be committed to storage before it returns `Ok`.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Fails with `Error::AlreadyFollowing` if the pair already exists.
    async fn follow(&self, channel_id: u64, game_id: u64) -> Result<(), Error>;

    /// Fails with `Error::NotFollowing` if the pair does not exist.
    async fn unfollow(&self, channel_id: u64, game_id: u64) -> Result<(), Error>;

    /// Game ids followed by `channel_id`, oldest follow first.
    async fn list(&self, channel_id: u64) -> Result<Vec<u64>, Error>;

    /// Every followed pair, oldest follow first. Used by the scheduler.
    /// Only the keys are read, so one unreadable phase cannot hide the others.
    async fn list_all(&self) -> Result<Vec<FollowKey>, Error>;

    async fn get(&self, channel_id: u64, game_id: u64) -> Result<Option<FollowRecord>, Error>;

    /// Returns `false` (and changes nothing) when the record no longer exists.
    async fn update_last_notified(
        &self,
        channel_id: u64,
        game_id: u64,
        phase: &GamePhase,
    ) -> Result<bool, Error>;
}

use chrono::{DateTime, Utc};

use crate::models::game::GamePhase;

/// One row of the follow registry: `channel_id` wants to hear about `game_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowRecord {
    pub channel_id: u64,        // Discord channel snowflake
    pub game_id: u64,           // WebDiplomacy gameID
    pub last_notified_phase: Option<GamePhase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of a follow. Ticks are serialized per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowKey {
    pub channel_id: u64,
    pub game_id: u64,
}

impl std::fmt::Display for FollowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel={} game={}", self.channel_id, self.game_id)
    }
}

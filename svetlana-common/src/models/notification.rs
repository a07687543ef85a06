use crate::models::game::GamePhase;

/// A rendered notification for one channel, produced by a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub channel_id: u64,
    pub game_id: u64,
    pub phase: GamePhase,
    pub text: String,
    /// Board link shown under the text.
    pub game_url: String,
}

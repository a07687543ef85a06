// File: svetlana-common/src/models/mod.rs
pub mod game;
pub mod follow;
pub mod notification;

pub use game::{GamePhase, GameSnapshot};
pub use follow::{FollowKey, FollowRecord};
pub use notification::NotificationMessage;

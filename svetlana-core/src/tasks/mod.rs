pub mod game_poll;

pub use game_poll::{GamePollScheduler, PollConfig};

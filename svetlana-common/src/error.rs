// ================================================================
// File: svetlana-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The fetcher gave up after its backoff schedule ran out.
    #[error("Fetch error: {url} failed after {attempts} attempt(s): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Channel {channel_id} is already following game {game_id}")]
    AlreadyFollowing { channel_id: u64, game_id: u64 },

    #[error("Channel {channel_id} is not following game {game_id}")]
    NotFollowing { channel_id: u64, game_id: u64 },

    #[error("Malformed game identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Storage failures break the registry's durability guarantee, everything
    /// else is scoped to a single tick or a single chat command.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Migration(_))
    }
}

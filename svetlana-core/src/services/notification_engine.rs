// svetlana-core/src/services/notification_engine.rs
//
// One tick = fetch the board, read it, classify it, and compare against what
// the channel was last told. The registry is written before anything is sent:
// if the write fails nothing goes out, and if sending fails afterwards the
// notification is dropped instead of being repeated on the next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use svetlana_common::models::{GamePhase, NotificationMessage};
use svetlana_common::traits::repository_traits::FollowRepository;
use svetlana_common::traits::sink_traits::NotificationSink;

use crate::services::message_catalog;
use crate::webdiplomacy::{classify_at, parse, BoardFetcher};
use crate::Error;

pub struct NotificationEngine {
    fetcher: BoardFetcher,
    registry: Arc<dyn FollowRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationEngine {
    pub fn new(
        fetcher: BoardFetcher,
        registry: Arc<dyn FollowRepository>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { fetcher, registry, sink }
    }

    pub fn registry(&self) -> &Arc<dyn FollowRepository> {
        &self.registry
    }

    /// Runs one evaluation cycle for a followed game.
    ///
    /// Returns the notification that went out, if any. Ticking a pair that is
    /// not followed is a caller bug and yields `Error::NotFollowing`.
    pub async fn tick(&self, channel_id: u64, game_id: u64) -> Result<Option<NotificationMessage>, Error> {
        self.run(channel_id, game_id, None).await
    }

    /// Like [`tick`](Self::tick) but classifies against a fixed clock.
    pub async fn tick_at(
        &self,
        channel_id: u64,
        game_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationMessage>, Error> {
        self.run(channel_id, game_id, Some(now)).await
    }

    async fn run(
        &self,
        channel_id: u64,
        game_id: u64,
        now: Option<DateTime<Utc>>,
    ) -> Result<Option<NotificationMessage>, Error> {
        let record = self
            .registry
            .get(channel_id, game_id)
            .await?
            .ok_or(Error::NotFollowing { channel_id, game_id })?;

        let document = self.fetcher.fetch(game_id).await?;
        let snapshot = parse(&document)?;
        // The fetch may have spent minutes in backoff; read the clock after it.
        let current = classify_at(&snapshot, now.unwrap_or_else(Utc::now));

        self.decide(channel_id, game_id, record.last_notified_phase.as_ref(), current)
            .await
    }

    async fn decide(
        &self,
        channel_id: u64,
        game_id: u64,
        last_notified: Option<&GamePhase>,
        current: GamePhase,
    ) -> Result<Option<NotificationMessage>, Error> {
        if last_notified == Some(&current) {
            debug!("Game {} for channel {} still {:?}; nothing to say", game_id, channel_id, current);
            return Ok(None);
        }

        let text = message_catalog::render(&current);

        if !self.registry.update_last_notified(channel_id, game_id, &current).await? {
            // Unfollowed while this tick was in flight.
            return Ok(None);
        }

        let Some(text) = text else {
            info!(
                "Game {} for channel {} moved to {}; recorded without notifying",
                game_id, channel_id, current.kind()
            );
            return Ok(None);
        };

        let message = NotificationMessage {
            channel_id,
            game_id,
            phase: current,
            text,
            game_url: self.fetcher.links().board_url(game_id),
        };

        if let Err(e) = self.sink.deliver(&message).await {
            error!(
                "Notification for game {} to channel {} is lost ({}): {:?}",
                game_id, channel_id, message.text, e
            );
            return Err(e);
        }

        info!("Notified channel {} about game {}: {}", channel_id, game_id, message.text);
        Ok(Some(message))
    }
}

// tests/engine_tests.rs

mod test_utils;

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;

use chrono::Utc;

use svetlana_common::models::{FollowKey, FollowRecord, GamePhase, NotificationMessage};
use svetlana_common::traits::sink_traits::NotificationSink;
use svetlana_core::repositories::{FollowRepository, SqliteFollowRepository};
use svetlana_core::services::NotificationEngine;
use svetlana_core::webdiplomacy::{BoardFetcher, BoardLinks};
use svetlana_core::Error;
use test_utils::*;

#[tokio::test]
async fn test_repeated_ticks_notify_once() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, running_board(3 * DAY + HOUR, &[]));

    let first = h.engine.tick_at(42, 1234, fixed_now()).await?;
    let first = first.expect("first tick should notify");
    assert_eq!(first.text, "The game starts in 3 days!");
    assert_eq!(first.game_url, "https://webdiplomacy.net/board.php?gameID=1234");
    assert_eq!(first.phase, GamePhase::CountdownDays(3));

    assert!(h.engine.tick_at(42, 1234, fixed_now()).await?.is_none());
    assert_eq!(h.sink.messages().len(), 1);

    h.http.set_board(1234, running_board(2 * DAY + HOUR, &[]));
    let next = h.engine.tick_at(42, 1234, fixed_now()).await?;
    assert_eq!(next.map(|m| m.text).as_deref(), Some("The game starts in 2 days!"));
    assert_eq!(h.sink.texts(), vec!["The game starts in 3 days!", "The game starts in 2 days!"]);

    let record = h.registry.get(42, 1234).await?.unwrap();
    assert_eq!(record.last_notified_phase, Some(GamePhase::CountdownDays(2)));
    Ok(())
}

#[tokio::test]
async fn test_critical_window_lists_unready() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, running_board(90 * MINUTE, &["Turkey", "France"]));

    let msg = h.engine.tick_at(42, 1234, fixed_now()).await?.unwrap();
    assert_eq!(msg.text, "Two hours left! These countries aren't ready: Turkey, France");

    // Someone readied up: the phase carries the list, so this is news.
    h.http.set_board(1234, running_board(80 * MINUTE, &["Turkey"]));
    let msg = h.engine.tick_at(42, 1234, fixed_now()).await?.unwrap();
    assert_eq!(msg.text, "Two hours left! These countries aren't ready: Turkey");

    h.http.set_board(1234, running_board(70 * MINUTE, &[]));
    let msg = h.engine.tick_at(42, 1234, fixed_now()).await?.unwrap();
    assert_eq!(msg.text, "Two hours left, everybody's ready!");
    Ok(())
}

#[tokio::test]
async fn test_endings_and_round_transition() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(1, 10).await?;
    h.registry.follow(1, 20).await?;
    h.registry.follow(1, 30).await?;

    h.http.set_board(10, won_board("Russia"));
    h.http.set_board(20, drawn_board(&["France", "Russia"]));
    h.http.set_board(30, running_board(-MINUTE, &["Italy"]));

    let won = h.engine.tick_at(1, 10, fixed_now()).await?.unwrap();
    let drawn = h.engine.tick_at(1, 20, fixed_now()).await?.unwrap();
    let round = h.engine.tick_at(1, 30, fixed_now()).await?.unwrap();
    assert_eq!(won.text, "Russia has won!");
    assert_eq!(drawn.text, "The game was a draw between France, Russia!");
    assert_eq!(round.text, "Starting new round! Good luck :)");
    Ok(())
}

#[tokio::test]
async fn test_silent_phases_are_recorded() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, running_board(5 * HOUR, &["Turkey"]));

    assert!(h.engine.tick_at(42, 1234, fixed_now()).await?.is_none());
    assert!(h.sink.messages().is_empty());
    let record = h.registry.get(42, 1234).await?.unwrap();
    assert_eq!(record.last_notified_phase, Some(GamePhase::CountdownNormal));
    Ok(())
}

#[tokio::test]
async fn test_unfollowed_pair_is_rejected() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.http.set_board(1234, won_board("Russia"));

    let res = h.engine.tick_at(42, 1234, fixed_now()).await;
    assert!(matches!(res, Err(Error::NotFollowing { channel_id: 42, game_id: 1234 })));
    assert_eq!(h.http.request_count(), 0);
    assert!(h.sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreadable_board_changes_nothing() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, "<html><body>maintenance</body></html>");

    let res = h.engine.tick_at(42, 1234, fixed_now()).await;
    assert!(matches!(res, Err(Error::Parse(_))));
    assert_eq!(h.registry.get(42, 1234).await?.unwrap().last_notified_phase, None);
    assert!(h.sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_delivery_is_not_repeated() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, won_board("Russia"));

    h.sink.set_failing(true);
    let res = h.engine.tick_at(42, 1234, fixed_now()).await;
    assert!(matches!(res, Err(Error::Platform(_))));
    assert_eq!(
        h.registry.get(42, 1234).await?.unwrap().last_notified_phase,
        Some(GamePhase::Won("Russia".into()))
    );

    h.sink.set_failing(false);
    assert!(h.engine.tick_at(42, 1234, fixed_now()).await?.is_none());
    assert!(h.sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_registry_outage_fails_tick_early() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(42, 1234).await?;
    h.http.set_board(1234, won_board("Russia"));
    h.db.close().await;

    let err = h.engine.tick_at(42, 1234, fixed_now()).await.unwrap_err();
    assert!(err.is_storage_failure());
    assert!(h.sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_each_channel_tracks_its_own_phase() -> Result<(), Error> {
    let h = engine_harness(StaticHttpClient::new()).await;
    h.registry.follow(1, 1234).await?;
    h.http.set_board(1234, won_board("Russia"));
    h.engine.tick_at(1, 1234, fixed_now()).await?;

    h.registry.follow(2, 1234).await?;
    let msg = h.engine.tick_at(2, 1234, fixed_now()).await?.unwrap();
    assert_eq!(msg.channel_id, 2);
    assert!(h.engine.tick_at(1, 1234, fixed_now()).await?.is_none());
    assert_eq!(h.sink.messages().len(), 2);
    Ok(())
}

mock! {
    Sink {}
    #[async_trait]
    impl NotificationSink for Sink {
        async fn deliver(&self, notification: &NotificationMessage) -> Result<(), Error>;
    }
}

#[tokio::test]
async fn test_sink_sees_rendered_message() -> Result<(), Error> {
    let db = setup_test_db().await;
    let registry = Arc::new(SqliteFollowRepository::new(db.pool().clone()));
    registry.follow(42, 1234).await?;

    let http = Arc::new(StaticHttpClient::new());
    http.set_board(1234, drawn_board(&["Austria", "Turkey"]));

    let mut sink = MockSink::new();
    sink.expect_deliver()
        .withf(|n| {
            n.channel_id == 42
                && n.game_id == 1234
                && n.text == "The game was a draw between Austria, Turkey!"
                && n.game_url == "https://webdiplomacy.net/board.php?gameID=1234"
        })
        .times(1)
        .returning(|_| Ok(()));

    let fetcher = BoardFetcher::new(http, BoardLinks::default(), quick_backoff());
    let engine = NotificationEngine::new(fetcher, registry, Arc::new(sink));
    engine.tick_at(42, 1234, fixed_now()).await?;
    engine.tick_at(42, 1234, fixed_now()).await?;
    Ok(())
}

mock! {
    Registry {}
    #[async_trait]
    impl FollowRepository for Registry {
        async fn follow(&self, channel_id: u64, game_id: u64) -> Result<(), Error>;
        async fn unfollow(&self, channel_id: u64, game_id: u64) -> Result<(), Error>;
        async fn list(&self, channel_id: u64) -> Result<Vec<u64>, Error>;
        async fn list_all(&self) -> Result<Vec<FollowKey>, Error>;
        async fn get(&self, channel_id: u64, game_id: u64) -> Result<Option<FollowRecord>, Error>;
        async fn update_last_notified(&self, channel_id: u64, game_id: u64, phase: &GamePhase) -> Result<bool, Error>;
    }
}

/// A registry that knows (42, 1234) with nothing announced yet.
fn registry_with_fresh_follow() -> MockRegistry {
    let mut registry = MockRegistry::new();
    registry.expect_get().returning(|channel_id, game_id| {
        let now = Utc::now();
        Ok(Some(FollowRecord {
            channel_id,
            game_id,
            last_notified_phase: None,
            created_at: now,
            updated_at: now,
        }))
    });
    registry
}

fn engine_with(registry: MockRegistry, sink: Arc<RecordingSink>) -> NotificationEngine {
    let http = Arc::new(StaticHttpClient::new());
    http.set_board(1234, won_board("Russia"));
    let fetcher = BoardFetcher::new(http, BoardLinks::default(), quick_backoff());
    NotificationEngine::new(fetcher, Arc::new(registry), sink)
}

#[tokio::test]
async fn test_failed_phase_write_blocks_notification() -> Result<(), Error> {
    let mut registry = registry_with_fresh_follow();
    registry
        .expect_update_last_notified()
        .times(1)
        .returning(|_, _, _| Err(Error::Database(sqlx::Error::PoolClosed)));

    let sink = Arc::new(RecordingSink::default());
    let engine = engine_with(registry, sink.clone());

    let err = engine.tick_at(42, 1234, fixed_now()).await.unwrap_err();
    assert!(err.is_storage_failure());
    assert!(sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unfollow_mid_tick_sends_nothing() -> Result<(), Error> {
    let mut registry = registry_with_fresh_follow();
    registry
        .expect_update_last_notified()
        .withf(|c, g, phase| *c == 42 && *g == 1234 && *phase == GamePhase::Won("Russia".into()))
        .times(1)
        .returning(|_, _, _| Ok(false));

    let sink = Arc::new(RecordingSink::default());
    let engine = engine_with(registry, sink.clone());

    assert!(engine.tick_at(42, 1234, fixed_now()).await?.is_none());
    assert!(sink.messages().is_empty());
    Ok(())
}

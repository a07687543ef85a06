// File: svetlana-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use svetlana_common::models::NotificationMessage;
use svetlana_common::traits::sink_traits::NotificationSink;
use svetlana_core::repositories::SqliteFollowRepository;
use svetlana_core::services::NotificationEngine;
use svetlana_core::webdiplomacy::{BackoffPolicy, BoardFetcher, BoardLinks};
use svetlana_core::{Database, Error, HttpClient};

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

pub async fn setup_test_db() -> Database {
    let db = Database::new(":memory:").await.unwrap();
    db.migrate().await.unwrap();
    db
}

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Board page with a deadline `secs_left` after [`fixed_now`] and the given
/// not-ready countries.
pub fn running_board(secs_left: i64, not_ready: &[&str]) -> String {
    let deadline = fixed_now().timestamp() + secs_left;
    let mut html = format!(
        "<html>\n<div class=\"gameTimeRemaining\"><span class=\"timestampGames\" unixtime=\"{deadline}\">soon</span></div>\n"
    );
    html.push_str("<span class=\"memberCountryName\"><img src=\"tick.png\" /><span class=\"memberStatusPlaying\">England</span></span>\n");
    for name in not_ready {
        html.push_str(&format!(
            "<span class=\"memberCountryName\"><img src=\"alert.png\" /><span class=\"memberStatusPlaying\">{name}</span></span>\n"
        ));
    }
    html.push_str("</html>\n");
    html
}

pub fn won_board(winner: &str) -> String {
    format!("<span class=\"memberCountryName\"><span class=\"memberStatusWon\">{winner}</span></span>\n")
}

pub fn drawn_board(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("<span class=\"memberCountryName\"><span class=\"memberStatusDrawn\">{n}</span></span>\n"))
        .collect()
}

/// Serves whatever board was last set for a game id. Unknown games 404.
#[derive(Default)]
pub struct StaticHttpClient {
    boards: Mutex<HashMap<u64, String>>,
    pub requests: AtomicUsize,
    pub delay: Option<Duration>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    pub fn set_board(&self, game_id: u64, html: impl Into<String>) {
        self.boards.lock().unwrap().insert(game_id, html.into());
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for StaticHttpClient {
    async fn get(&self, url: &str) -> Result<String, Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let game_id: u64 = url
            .rsplit("gameID=")
            .next()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| Error::Platform(format!("unexpected url {url}")))?;
        self.boards
            .lock()
            .unwrap()
            .get(&game_id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("404 for {url}")))
    }
}

/// Always fails, counting how often it was asked.
#[derive(Default)]
pub struct FailingHttpClient {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl HttpClient for FailingHttpClient {
    async fn get(&self, _url: &str) -> Result<String, Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Platform("connection refused".into()))
    }
}

/// Keeps every delivered notification. Can be told to fail instead.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<NotificationMessage>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &NotificationMessage) -> Result<(), Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Platform("Discord is down".into()));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn quick_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(300))
}

pub struct EngineHarness {
    pub db: Database,
    pub registry: Arc<SqliteFollowRepository>,
    pub http: Arc<StaticHttpClient>,
    pub sink: Arc<RecordingSink>,
    pub engine: Arc<NotificationEngine>,
}

pub async fn engine_harness(http: StaticHttpClient) -> EngineHarness {
    let db = setup_test_db().await;
    let registry = Arc::new(SqliteFollowRepository::new(db.pool().clone()));
    let http = Arc::new(http);
    let sink = Arc::new(RecordingSink::default());
    let fetcher = BoardFetcher::new(http.clone(), BoardLinks::default(), quick_backoff());
    let engine = Arc::new(NotificationEngine::new(fetcher, registry.clone(), sink.clone()));
    EngineHarness { db, registry, http, sink, engine }
}

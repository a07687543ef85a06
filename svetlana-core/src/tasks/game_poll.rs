// src/tasks/game_poll.rs
//
// Drives NotificationEngine::tick for every followed (channel, game) pair.
// Each pass lists the registry and spawns one task per pair. A pair whose
// previous tick is still running is skipped for that pass, so ticks for the
// same pair never overlap while different pairs poll in parallel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use svetlana_common::models::FollowKey;

use crate::services::NotificationEngine;
use crate::Error;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Time between scheduling passes.
    pub interval: Duration,
    /// Consecutive registry failures after which the scheduler gives up.
    pub max_storage_failures: u32,
    /// How long in-flight ticks get to finish on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_storage_failures: 3,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Removes its key from the in-flight set when the tick task ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<DashMap<FollowKey, ()>>,
    key: FollowKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

pub struct GamePollScheduler {
    engine: Arc<NotificationEngine>,
    config: PollConfig,
    in_flight: Arc<DashMap<FollowKey, ()>>,
    storage_failures: Arc<AtomicU32>,
    fatal: Arc<Mutex<Option<Error>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl GamePollScheduler {
    pub fn new(engine: Arc<NotificationEngine>, config: PollConfig) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            engine,
            config,
            in_flight: Arc::new(DashMap::new()),
            storage_failures: Arc::new(AtomicU32::new(0)),
            fatal: Arc::new(Mutex::new(None)),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Polls until shutdown. Returns `Err` only when the registry kept failing,
    /// which the caller should treat as fatal.
    pub async fn run(&self) -> Result<(), Error> {
        info!("Game poller started (every {:?})", self.config.interval);
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut tasks = JoinSet::new();

        while !self.is_shutdown() {
            tokio::select! {
                _ = ticker.tick() => {
                    while tasks.try_join_next().is_some() {}
                    if let Err(e) = self.spawn_pass(&mut tasks).await {
                        error!("Scheduling pass failed: {:?}", e);
                    }
                }
                Ok(_) = shutdown_rx.changed() => {}
            }
        }

        info!("Game poller stopping; waiting for {} in-flight tick(s)", tasks.len());
        let drained = timeout(self.config.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("In-flight ticks did not finish in {:?}; aborting them", self.config.shutdown_grace);
            tasks.shutdown().await;
        }

        match self.take_fatal() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs a single pass and waits for every tick it started.
    /// Returns the number of ticks started.
    pub async fn poll_once(&self) -> Result<usize, Error> {
        let mut tasks = JoinSet::new();
        let started = self.spawn_pass(&mut tasks).await?;
        while tasks.join_next().await.is_some() {}
        Ok(started)
    }

    /// Lists the registry and spawns a tick for every pair that has none in
    /// flight. Returns the number of ticks started.
    pub async fn spawn_pass(&self, tasks: &mut JoinSet<()>) -> Result<usize, Error> {
        let keys = match self.engine.registry().list_all().await {
            Ok(keys) => keys,
            Err(e) => {
                self.note_failure(&e);
                return Err(e);
            }
        };

        let mut started = 0;
        for key in keys {
            if self.in_flight.insert(key, ()).is_some() {
                debug!("Previous tick for {} still running; skipping", key);
                continue;
            }
            let guard = InFlightGuard {
                in_flight: self.in_flight.clone(),
                key,
            };

            let engine = self.engine.clone();
            let failures = self.storage_failures.clone();
            let fatal = self.fatal.clone();
            let shutdown_tx = self.shutdown_tx.clone();
            let max_failures = self.config.max_storage_failures;

            tasks.spawn(async move {
                let _guard = guard;
                match engine.tick(key.channel_id, key.game_id).await {
                    Ok(_) => {
                        failures.store(0, Ordering::SeqCst);
                    }
                    Err(e) => handle_tick_error(key, e, &failures, max_failures, &fatal, &shutdown_tx),
                }
            });
            started += 1;
        }

        if started > 0 {
            debug!("Scheduled {} tick(s)", started);
        }
        Ok(started)
    }

    fn note_failure(&self, e: &Error) {
        if !e.is_storage_failure() {
            return;
        }
        let count = self.storage_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.max_storage_failures {
            error!("Follow registry failed {} times in a row; stopping", count);
            set_fatal(&self.fatal, Error::Platform(format!("follow registry unavailable: {e}")));
            let _ = self.shutdown_tx.send(true);
        }
    }

    fn take_fatal(&self) -> Option<Error> {
        self.fatal.lock().ok().and_then(|mut slot| slot.take())
    }
}

fn set_fatal(slot: &Mutex<Option<Error>>, e: Error) {
    if let Ok(mut slot) = slot.lock() {
        if slot.is_none() {
            *slot = Some(e);
        }
    }
}

fn handle_tick_error(
    key: FollowKey,
    e: Error,
    failures: &AtomicU32,
    max_failures: u32,
    fatal: &Mutex<Option<Error>>,
    shutdown_tx: &watch::Sender<bool>,
) {
    if e.is_storage_failure() {
        let count = failures.fetch_add(1, Ordering::SeqCst) + 1;
        error!("Registry failure during tick for {} ({} in a row): {:?}", key, count, e);
        if count >= max_failures {
            error!("Follow registry failed {} times in a row; stopping", count);
            set_fatal(fatal, e);
            let _ = shutdown_tx.send(true);
        }
        return;
    }

    match e {
        Error::NotFollowing { .. } => {
            debug!("{} was unfollowed before its tick started", key);
        }
        Error::Fetch { .. } => {
            warn!("Skipping tick for {}; will retry next period: {}", key, e);
        }
        Error::Parse(reason) => {
            warn!("Could not read board for {}; skipping tick: {}", key, reason);
        }
        Error::Json(err) => {
            error!("Stored phase for {} is unreadable; skipping tick: {}", key, err);
        }
        other => {
            error!("Tick for {} failed: {:?}", key, other);
        }
    }
}

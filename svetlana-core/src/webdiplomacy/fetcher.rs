use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::http::HttpClient;
use crate::webdiplomacy::links::BoardLinks;
use crate::Error;

/// Retry schedule for board requests.
///
/// After a failed attempt the fetcher waits `delay` and doubles it. Once the
/// doubled delay would go past `threshold` the fetcher stops and reports the
/// failure. With the defaults (1s, 300s) that is at most 9 attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub threshold: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            threshold: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, threshold: Duration) -> Self {
        Self { base, threshold }
    }

    /// Waits between consecutive attempts, in order.
    pub fn retry_delays(&self) -> RetryDelays {
        RetryDelays {
            next: Some(self.base),
            threshold: self.threshold,
        }
    }

    /// Upper bound on requests made for one fetch.
    pub fn max_attempts(&self) -> u32 {
        1 + self.retry_delays().count() as u32
    }
}

#[derive(Debug, Clone)]
pub struct RetryDelays {
    next: Option<Duration>,
    threshold: Duration,
}

impl Iterator for RetryDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.next?;
        match delay.checked_mul(2) {
            Some(doubled) if doubled <= self.threshold => {
                self.next = Some(doubled);
                Some(delay)
            }
            _ => {
                self.next = None;
                None
            }
        }
    }
}

/// Downloads board pages. Knows nothing about what is on them.
#[derive(Clone)]
pub struct BoardFetcher {
    http: Arc<dyn HttpClient>,
    links: BoardLinks,
    backoff: BackoffPolicy,
}

impl BoardFetcher {
    pub fn new(http: Arc<dyn HttpClient>, links: BoardLinks, backoff: BackoffPolicy) -> Self {
        Self { http, links, backoff }
    }

    pub fn links(&self) -> &BoardLinks {
        &self.links
    }

    /// Fetches the board for `game_id`, retrying with exponential backoff.
    /// Only the calling task sleeps between attempts.
    pub async fn fetch(&self, game_id: u64) -> Result<String, Error> {
        let url = self.links.board_url(game_id);
        let mut delays = self.backoff.retry_delays();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.http.get(&url).await {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes, attempt {})", url, body.len(), attempts);
                    return Ok(body);
                }
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!("Request failed: \"{}\" \"{}\"; retrying in {:?}", url, e, delay);
                        sleep(delay).await;
                    }
                    None => {
                        error!("Request failed: \"{}\" \"{}\"; giving up after {} attempt(s)", url, e, attempts);
                        return Err(Error::Fetch {
                            url,
                            attempts,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }
    }
}

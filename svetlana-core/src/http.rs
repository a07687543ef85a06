//! HTTP client abstraction used by the board fetcher.
//!
//! The fetcher only needs "GET this URL and give me the body", so that is all
//! the trait exposes. Tests swap in canned or failing clients; production uses
//! [`DefaultHttpClient`], a thin wrapper around `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use crate::Error;

/// A generic trait for making HTTP requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the body. Non-2xx responses are errors.
    async fn get(&self, url: &str) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("svetlana/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn get(&self, url: &str) -> Result<String, Error> {
        let response = self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(response)
    }
}

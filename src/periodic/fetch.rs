use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

/// Raw answer of a health endpoint; status handling happens in `process`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

#[cfg(test)]
impl FeedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        FeedResponse { status: 200, reason: "OK".to_string(), body: body.into() }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Http(err) }
    }
}

pub type FetchOutcome = Result<FeedResponse, FetchError>;

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// reqwest-backed source with separate connect and total timeouts.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .user_agent(concat!("oslobot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        let resp = self.client.get(url).send().await.map_err(FetchError::from_reqwest)?;
        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        let body = resp.text().await.map_err(FetchError::from_reqwest)?;
        Ok(FeedResponse { status: status.as_u16(), reason, body })
    }
}

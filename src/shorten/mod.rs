use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::{self};

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("unable to shorten '{0}': http request timed out")]
    Timeout(String),
    #[error("unable to shorten '{url}': http error '{reason}' ({status})")]
    Api { url: String, status: u16, reason: String },
    #[error("unable to shorten '{url}': {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("unable to shorten '{url}': request extraction error: {reason}")]
    Decode { url: String, reason: String },
}

/// The remote half of the shortener: one request, no caching.
#[async_trait]
pub trait ShortenApi: Send + Sync {
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenError>;
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    #[serde(rename = "longUrl")]
    long_url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    id: String,
}

/// Google-style url shortener endpoint (`POST <url>?key=<api key>`).
pub struct GoogleShortener {
    http: HttpClient,
    endpoint: String,
    api_key: String,
}

impl GoogleShortener {
    pub fn new(endpoint: &str, api_key: &str, connect_timeout: Duration, timeout: Duration) -> anyhow::Result<Self> {
        let http = HttpClient::builder().connect_timeout(connect_timeout).timeout(timeout).build()?;
        Ok(Self { http, endpoint: endpoint.trim_end_matches(['?', '/']).to_string(), api_key: api_key.to_string() })
    }
}

#[async_trait]
impl ShortenApi for GoogleShortener {
    async fn shorten(&self, long_url: &str) -> Result<String, ShortenError> {
        let http_err = |e: reqwest::Error| {
            if e.is_timeout() { ShortenError::Timeout(long_url.to_string()) } else { ShortenError::Http { url: long_url.to_string(), source: e } }
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&ShortenRequest { long_url })
            .send()
            .await
            .map_err(http_err)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(http_err)?;
        decode_response(long_url, status, &bytes)
    }
}

fn decode_response(long_url: &str, status: StatusCode, body: &[u8]) -> Result<String, ShortenError> {
    if status != StatusCode::OK {
        return Err(ShortenError::Api {
            url: long_url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }
    let parsed: ShortenResponse = serde_json::from_slice(body)
        .map_err(|e| ShortenError::Decode { url: long_url.to_string(), reason: e.to_string() })?;
    Ok(parsed.id)
}

/// Memoizing shortener. The cache lives as long as the value and never evicts.
pub struct LinkShortener {
    api: Arc<dyn ShortenApi>,
    cache: Mutex<HashMap<String, String>>,
}

impl LinkShortener {
    pub fn new(api: Arc<dyn ShortenApi>) -> Self {
        Self { api, cache: Mutex::new(HashMap::new()) }
    }

    fn cached(&self, long_url: &str) -> Option<String> {
        self.cache.lock().ok().and_then(|c| c.get(long_url).cloned())
    }

    pub async fn shorten(&self, long_url: &str) -> Result<String, ShortenError> {
        if let Some(hit) = self.cached(long_url) { return Ok(hit); }
        let short = self.api.shorten(long_url).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(long_url.to_string(), short.clone());
        }
        Ok(short)
    }

    /// Like `shorten`, but any failure hands back the long url.
    pub async fn safe_shorten(&self, long_url: &str) -> String {
        match self.shorten(long_url).await {
            Ok(short) => short,
            Err(e) => {
                let log = telemetry::report();
                log.warn_kv("failed shortening, providing back long url", [("url", long_url.to_string()), ("error", e.to_string())]);
                long_url.to_string()
            }
        }
    }
}



#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::util::http_stub::{serve_once, Reply};

    fn client(base: &str, timeout: Duration) -> GoogleShortener {
        GoogleShortener::new(&format!("{base}/urlshortener/v1/url"), "k3y", Duration::from_secs(1), timeout).unwrap()
    }

    #[tokio::test]
    async fn posts_long_url_with_key_query() {
        let (base, req) = serve_once(Reply::Canned {
            status_line: "200 OK",
            body: r#"{"kind":"urlshortener#url","id":"http://goo.gl/fbsS","longUrl":"http://logs/x"}"#.into(),
        })
        .await;
        let got = client(&base, Duration::from_secs(5)).shorten("http://logs/x").await.unwrap();
        assert_eq!(got, "http://goo.gl/fbsS");

        let req = req.await.unwrap();
        assert_eq!(req.request_line(), "POST /urlshortener/v1/url?key=k3y HTTP/1.1");
        assert!(req.header("content-type").is_some_and(|ct| ct.starts_with("application/json")));
        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body, serde_json::json!({"longUrl": "http://logs/x"}));
    }

    #[tokio::test]
    async fn stalled_endpoint_is_a_timeout() {
        let (base, _req) = serve_once(Reply::Stall).await;
        let err = client(&base, Duration::from_millis(150)).shorten("http://logs/x").await.unwrap_err();
        assert!(matches!(err, ShortenError::Timeout(ref u) if u == "http://logs/x"), "got {err:?}");
    }

    #[tokio::test]
    async fn rejected_key_is_an_api_error() {
        let (base, _req) = serve_once(Reply::Canned { status_line: "403 Forbidden", body: "{}".into() }).await;
        let err = client(&base, Duration::from_secs(5)).shorten("http://logs/x").await.unwrap_err();
        assert!(matches!(err, ShortenError::Api { status: 403, .. }));
    }
}

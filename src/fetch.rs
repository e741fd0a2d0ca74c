// src/fetch.rs
//! Network transport seam: `fetch(url) -> bytes`, failing with `FetchError`.
//!
//! `HttpFetcher` is the reqwest implementation used by the binary. Every call
//! carries an explicit timeout (per-call override or the client default).
//! `StaticFetcher` serves canned bodies and is used by tests and dry fixtures.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;

use crate::config::HttpCfg;
use crate::error::FetchError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` with the default per-call timeout.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch with an explicit timeout and an optional body cap (bytes beyond
    /// `max_bytes` are discarded).
    async fn fetch_limited(
        &self,
        url: &str,
        timeout: Duration,
        max_bytes: Option<usize>,
    ) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &HttpCfg) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                source: e,
            })?;
        Ok(Self {
            client,
            timeout: cfg.request_timeout(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_limited(url, self.timeout, None).await
    }

    async fn fetch_limited(
        &self,
        url: &str,
        timeout: Duration,
        max_bytes: Option<usize>,
    ) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let t0 = Instant::now();
        let http_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    secs: timeout.as_secs(),
                }
            } else {
                FetchError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        };

        let mut resp = self
            .client
            .get(parsed)
            .header(
                reqwest::header::ACCEPT,
                "application/json, application/xml, text/xml, text/html;q=0.9,*/*;q=0.8",
            )
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(http_err)? {
            body.extend_from_slice(&chunk);
            if let Some(cap) = max_bytes {
                if body.len() >= cap {
                    body.truncate(cap);
                    break;
                }
            }
        }

        histogram!("curator_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(body)
    }
}

/// In-memory fetcher: exact-URL lookup of canned bodies, with a request log.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }

    async fn fetch_limited(
        &self,
        url: &str,
        _timeout: Duration,
        max_bytes: Option<usize>,
    ) -> Result<Vec<u8>, FetchError> {
        let mut body = self.fetch(url).await?;
        if let Some(cap) = max_bytes {
            body.truncate(cap);
        }
        Ok(body)
    }
}

//! In-memory fetcher
//!
//! Serves fixed documents by URL and records every fetch. Used for offline
//! runs and tests.

use super::types::{Document, Fetcher, Request};
use crate::error::{Error, Result};
use crate::types::StringMap;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One fetch seen by a `MemoryFetcher`
#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub url: String,
    pub started: Instant,
}

#[derive(Debug, Clone)]
struct Fixture {
    content: String,
    cookies: StringMap,
}

fn key(url: &str) -> String {
    url::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string())
}

/// Serves documents from memory
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, Fixture>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    log: Mutex<Vec<FetchRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for `url`
    #[must_use]
    pub fn with_page(self, url: &str, content: impl Into<String>) -> Self {
        self.with_page_cookies(url, content, StringMap::new())
    }

    /// Serve `content` for `url`, setting cookies on the response
    #[must_use]
    pub fn with_page_cookies(
        mut self,
        url: &str,
        content: impl Into<String>,
        cookies: StringMap,
    ) -> Self {
        self.pages.insert(
            key(url),
            Fixture {
                content: content.into(),
                cookies,
            },
        );
        self
    }

    /// Fail every fetch of `url`
    #[must_use]
    pub fn with_failure(mut self, url: &str) -> Self {
        self.failing.insert(key(url));
        self
    }

    /// Wait before answering each fetch
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every fetch so far, in start order
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// URLs fetched so far, in start order
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetch_log().into_iter().map(|r| r.url).collect()
    }

    /// Highest number of fetches that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, request: &Request) -> Result<Document> {
        let url = request.full_url();
        let key = url.to_string();
        if self.failing.contains(&key) {
            return Err(Error::http_status(500, format!("fixture failure for {key}")));
        }
        self.pages
            .get(&key)
            .map(|f| Document::new(url, f.content.clone()).with_cookies(f.cookies.clone()))
            .ok_or_else(|| Error::http_status(404, format!("no fixture for {key}")))
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: &Request) -> Result<Document> {
        let url = request.full_url().to_string();
        if let Ok(mut log) = self.log.lock() {
            log.push(FetchRecord {
                url,
                started: Instant::now(),
            });
        }

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.lookup(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn probe(&self, request: &Request) -> Result<bool> {
        Ok(self.lookup(request).is_ok())
    }
}

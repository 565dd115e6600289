//! Fetcher types and traits
//!
//! Defines requests, fetched documents and the fetcher abstraction.

use crate::error::{Error, Result};
use crate::types::StringMap;
use async_trait::async_trait;
use std::path::Path;
use url::Url;

// ============================================================================
// Request
// ============================================================================

/// A document to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target URL (`http`, `https` or `file`)
    pub url: Url,
    /// Query parameters appended to the URL
    pub params: StringMap,
    /// Extra request headers
    pub headers: StringMap,
    /// Cookies sent with the request
    pub cookies: StringMap,
}

impl Request {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            params: StringMap::new(),
            headers: StringMap::new(),
            cookies: StringMap::new(),
        }
    }

    /// Parse a URL, or a local path which becomes a `file://` URL
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Ok(url) = Url::parse(input) {
            if matches!(url.scheme(), "http" | "https" | "file") {
                return Ok(Self::new(url));
            }
        }

        let path = Path::new(input);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(Self::new)
            .map_err(|()| Error::invalid_value("input", format!("'{input}' is neither a URL nor a path")))
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: StringMap) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// URL including the request parameters
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.params {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Key used to rate limit requests to the same host
    pub fn host_key(&self) -> String {
        match self.url.host_str() {
            Some(host) => match self.url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            },
            None => self.url.scheme().to_string(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.url.scheme() == "file"
    }
}

// ============================================================================
// Document
// ============================================================================

/// A fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Final URL of the document, used to resolve relative links
    pub url: Url,
    /// Body text
    pub content: String,
    /// HTTP status (200 for files)
    pub status: u16,
    /// Response headers
    pub headers: StringMap,
    /// Cookies set by the response
    pub cookies: StringMap,
}

impl Document {
    pub fn new(url: Url, content: impl Into<String>) -> Self {
        Self {
            url,
            content: content.into(),
            status: 200,
            headers: StringMap::new(),
            cookies: StringMap::new(),
        }
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: StringMap) -> Self {
        self.cookies = cookies;
        self
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Trait for retrieving documents
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a document
    async fn fetch(&self, request: &Request) -> Result<Document>;

    /// Check that a document exists without processing it
    async fn probe(&self, request: &Request) -> Result<bool> {
        Ok(self.fetch(request).await.is_ok())
    }
}

//! Local file fetcher

use super::types::{Document, Fetcher, Request};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads `file://` URLs, such as previously downloaded pages
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }

    fn path(request: &Request) -> Result<PathBuf> {
        if !request.is_file() {
            return Err(Error::config(format!(
                "File fetcher cannot read '{}'",
                request.url
            )));
        }
        request
            .url
            .to_file_path()
            .map_err(|()| Error::invalid_value("url", format!("'{}' is not a file path", request.url)))
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, request: &Request) -> Result<Document> {
        let path = Self::path(request)?;
        debug!(path = %path.display(), "Reading file");

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Document::new(request.url.clone(), content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound {
                path: path.display().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn probe(&self, request: &Request) -> Result<bool> {
        let path = Self::path(request)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }
}

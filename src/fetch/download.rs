//! Persisting fetched documents
//!
//! Every fetched page and followed document can be written to disk under a
//! name rendered from a `FileNamePattern`.

use super::types::Document;
use crate::error::{Error, Result};
use crate::template::{FileNamePattern, PatternContext};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Where and how downloaded documents are saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Root directory
    pub dir: PathBuf,
    /// Pattern for pages of the top-level entities
    pub file_name_pattern: String,
    /// Pattern for followed documents
    pub follower_pattern: String,
    /// File extension appended to every name
    pub extension: Option<String>,
    /// Overwrite files that already exist
    pub overwrite: bool,
    /// Value of `{batch}`
    pub batch_id: Option<String>,
    /// Value of `{date}`; the time of each save when absent
    #[serde(skip)]
    pub parse_date: Option<DateTime<Local>>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("downloads"),
            file_name_pattern: "file_{page}".to_string(),
            follower_pattern: "{parent}/file_{entry}".to_string(),
            extension: None,
            overwrite: true,
            batch_id: None,
            parse_date: None,
        }
    }
}

impl DownloadSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_file_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_name_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_follower_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.follower_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    #[must_use]
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn with_parse_date(mut self, date: DateTime<Local>) -> Self {
        self.parse_date = Some(date);
        self
    }
}

/// Writes documents to disk
#[derive(Debug)]
pub struct DownloadStore {
    settings: DownloadSettings,
    page_pattern: FileNamePattern,
    follower_pattern: FileNamePattern,
    entries: AtomicU32,
}

impl DownloadStore {
    pub fn new(settings: DownloadSettings) -> Result<Self> {
        let page_pattern = FileNamePattern::new(&settings.file_name_pattern)?;
        let follower_pattern = FileNamePattern::new(&settings.follower_pattern)?;
        if page_pattern.uses("parent") {
            return Err(Error::invalid_value(
                "file_name_pattern",
                "{parent} is only available to followed documents",
            ));
        }
        Ok(Self {
            settings,
            page_pattern,
            follower_pattern,
            entries: AtomicU32::new(0),
        })
    }

    /// Save a page of the top-level entities
    pub async fn save_page(&self, document: &Document, page: u32) -> Result<PathBuf> {
        let mut ctx = self.context(document);
        ctx.set_page(page);
        let name = self.page_pattern.render(&ctx)?;
        self.write(&name, document).await
    }

    /// Save a followed document
    ///
    /// `parent` is where the document holding the link was saved.
    pub async fn save_follower(
        &self,
        document: &Document,
        page: u32,
        parent: Option<&Path>,
    ) -> Result<PathBuf> {
        let entry = self.entries.fetch_add(1, Ordering::SeqCst) + 1;

        let mut ctx = self.context(document);
        ctx.set_page(page).set_entry(entry);
        if let Some(parent) = parent {
            ctx.set_parent(self.parent_name(parent));
        }
        let name = self.follower_pattern.render(&ctx)?;
        self.write(&name, document).await
    }

    fn context(&self, document: &Document) -> PatternContext {
        let mut ctx = PatternContext::new();
        ctx.set_url(document.url.clone());
        if let Some(batch) = &self.settings.batch_id {
            ctx.set_batch(batch.clone());
        }
        if let Some(date) = self.settings.parse_date {
            ctx.set_date(date);
        }
        ctx
    }

    /// Parent path relative to the download dir, without extension
    fn parent_name(&self, parent: &Path) -> String {
        let relative = parent.strip_prefix(&self.settings.dir).unwrap_or(parent);
        relative.with_extension("").to_string_lossy().into_owned()
    }

    async fn write(&self, name: &str, document: &Document) -> Result<PathBuf> {
        let mut path = self.settings.dir.join(name.trim_start_matches('/'));
        if let Some(ext) = &self.settings.extension {
            let file_name = path
                .file_name()
                .map(|n| format!("{}.{}", n.to_string_lossy(), ext.trim_start_matches('.')))
                .ok_or_else(|| Error::output(format!("Invalid download file name '{name}'")))?;
            path.set_file_name(file_name);
        }

        if !self.settings.overwrite && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Download exists, not overwriting");
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, document.content.as_bytes()).await?;
        debug!(url = %document.url, path = %path.display(), "Saved document");
        Ok(path)
    }
}

//! Parser types
//!
//! Settings, statistics and the processors that receive rows while parsing.

use crate::error::{Error, Result};
use crate::fetch::DownloadSettings;
use crate::follow::MAX_POOL_SIZE;
use crate::http::DEFAULT_REMOTE_INTERVAL;
use crate::pagination::PaginatorSettings;
use crate::results::{normalize, Record, Results};
use crate::types::{EmptyJoin, Nesting};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Settings
// ============================================================================

/// Configuration of an `EntityParser`
#[derive(Debug, Clone, PartialEq)]
pub struct ParserSettings {
    /// Nesting of followers that do not set their own
    pub nesting: Nesting,
    /// Error policy of followers that do not set their own
    pub ignore_following_errors: bool,
    /// Concurrent link fetches; one per core (at least 4) when absent
    pub download_threads: Option<usize>,
    /// Minimum time between two requests to the same host
    pub remote_interval: Duration,
    /// What joins do with parents whose child has no rows
    pub empty_join: EmptyJoin,
    /// Pagination, if the input spans several pages
    pub paginator: Option<PaginatorSettings>,
    /// Save every fetched document
    pub downloads: Option<DownloadSettings>,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            nesting: Nesting::Link,
            ignore_following_errors: true,
            download_threads: None,
            remote_interval: DEFAULT_REMOTE_INTERVAL,
            empty_join: EmptyJoin::KeepParent,
            paginator: None,
            downloads: None,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = nesting;
        self
    }

    #[must_use]
    pub fn with_ignore_following_errors(mut self, ignore: bool) -> Self {
        self.ignore_following_errors = ignore;
        self
    }

    #[must_use]
    pub fn with_download_threads(mut self, threads: usize) -> Self {
        self.download_threads = Some(threads);
        self
    }

    #[must_use]
    pub fn with_remote_interval(mut self, interval: Duration) -> Self {
        self.remote_interval = interval;
        self
    }

    #[must_use]
    pub fn with_empty_join(mut self, empty_join: EmptyJoin) -> Self {
        self.empty_join = empty_join;
        self
    }

    #[must_use]
    pub fn with_paginator(mut self, paginator: PaginatorSettings) -> Self {
        self.paginator = Some(paginator);
        self
    }

    #[must_use]
    pub fn with_downloads(mut self, downloads: DownloadSettings) -> Self {
        self.downloads = Some(downloads);
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if let Some(threads) = self.download_threads {
            if !(1..=MAX_POOL_SIZE).contains(&threads) {
                return Err(Error::invalid_value(
                    "download_threads",
                    format!("must be between 1 and {MAX_POOL_SIZE}, got {threads}"),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics from a parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Pages fetched
    pub pages: u32,
    /// Rows published
    pub rows: u64,
    /// Links fetched and extracted
    pub links_followed: u64,
    /// Links that failed, ignored or not
    pub link_errors: u64,
    /// Errors handed to the error handler
    pub errors: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// The records of one entity, in publication order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecords {
    pub entity: String,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

// ============================================================================
// Processors
// ============================================================================

/// Receives the rows of one entity as they are produced
pub trait RowProcessor: Send {
    /// Called once before the first page
    fn process_started(&mut self, _entity: &str) {}

    /// Called for every published row, with the child results of its links
    fn process_row(&mut self, record: Record, linked: &Results) -> Result<()>;

    /// Called once after the last page
    fn process_ended(&mut self, _entity: &str) {}
}

impl<F> RowProcessor for F
where
    F: FnMut(Record, &Results) -> Result<()> + Send,
{
    fn process_row(&mut self, record: Record, linked: &Results) -> Result<()> {
        self(record, linked)
    }
}

/// What to do after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Skip the failed row and keep parsing
    Continue,
    /// Stop parsing
    Stop,
}

/// Decides what happens after a row fails
pub trait ErrorHandler: Send {
    fn handle(&mut self, entity: &str, error: &Error) -> ErrorAction;
}

impl<F> ErrorHandler for F
where
    F: FnMut(&str, &Error) -> ErrorAction + Send,
{
    fn handle(&mut self, entity: &str, error: &Error) -> ErrorAction {
        self(entity, error)
    }
}

/// Row processors per entity and an optional error handler
#[derive(Default)]
pub struct Processors {
    processors: Vec<(String, Box<dyn RowProcessor>)>,
    error_handler: Option<Box<dyn ErrorHandler>>,
}

impl Processors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the rows of `entity` to `processor`, replacing any previous one
    #[must_use]
    pub fn with_processor(mut self, entity: &str, processor: impl RowProcessor + 'static) -> Self {
        self.set_processor(entity, processor);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn set_processor(
        &mut self,
        entity: &str,
        processor: impl RowProcessor + 'static,
    ) -> &mut Self {
        let key = normalize(entity).unwrap_or_default();
        self.processors.retain(|(k, _)| *k != key);
        self.processors.push((key, Box::new(processor)));
        self
    }

    pub fn has_error_handler(&self) -> bool {
        self.error_handler.is_some()
    }

    pub(crate) fn processor_mut(&mut self, entity: &str) -> Option<&mut Box<dyn RowProcessor>> {
        let key = normalize(entity).ok()?;
        self.processors
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| p)
    }

    /// `None` when there is no handler
    pub(crate) fn handle_error(&mut self, entity: &str, error: &Error) -> Option<ErrorAction> {
        self.error_handler
            .as_mut()
            .map(|handler| handler.handle(entity, error))
    }
}

impl fmt::Debug for Processors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processors")
            .field(
                "entities",
                &self.processors.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

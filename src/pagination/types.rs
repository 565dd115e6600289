//! Pagination types and traits
//!
//! Defines paginator settings, state and the context handed to callers.

use crate::entity::FieldDefinition;
use crate::fetch::Request;
use crate::types::StringMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

// ============================================================================
// Reserved Field Names
// ============================================================================

/// Token identifying the current page
pub const CURRENT_PAGE: &str = "current_page";
/// Number of the current page
pub const CURRENT_PAGE_NUMBER: &str = "current_page_number";
/// Token (link or parameter value) of the next page
pub const NEXT_PAGE: &str = "next_page";
/// Number of the next page
pub const NEXT_PAGE_NUMBER: &str = "next_page_number";

// ============================================================================
// Settings
// ============================================================================

/// Configuration for pagination behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginatorSettings {
    /// Values read from every page, relative to the document root
    pub fields: Vec<FieldDefinition>,
    /// Maximum number of pages visited, 0 for no limit
    pub follow_count: u32,
    /// Probe the next page before committing to it
    pub url_testing: bool,
    /// Query parameter carrying the page token or number
    pub page_param: Option<String>,
    /// Number of the first page when paging by parameter
    pub start_page: u32,
    /// Records per page to request
    pub ideal_page_size: Option<u32>,
    /// Query parameter carrying the page size
    pub page_size_param: Option<String>,
}

impl Default for PaginatorSettings {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            follow_count: 0,
            url_testing: false,
            page_param: None,
            start_page: 1,
            ideal_page_size: None,
            page_size_param: None,
        }
    }
}

impl PaginatorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value from every page
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.push(FieldDefinition::new(name, path));
        self
    }

    /// Read the next page link or token
    #[must_use]
    pub fn with_next_page(self, path: impl Into<String>) -> Self {
        self.with_field(NEXT_PAGE, path)
    }

    /// Read the next page number
    #[must_use]
    pub fn with_next_page_number(self, path: impl Into<String>) -> Self {
        self.with_field(NEXT_PAGE_NUMBER, path)
    }

    /// Visit at most `count` pages (0 for no limit)
    #[must_use]
    pub fn with_follow_count(mut self, count: u32) -> Self {
        self.follow_count = count;
        self
    }

    #[must_use]
    pub fn with_url_testing(mut self, enabled: bool) -> Self {
        self.url_testing = enabled;
        self
    }

    /// Page by query parameter
    #[must_use]
    pub fn with_page_param(mut self, param: impl Into<String>, start_page: u32) -> Self {
        self.page_param = Some(param.into());
        self.start_page = start_page;
        self
    }

    /// Request pages of `size` records
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u32) -> Self {
        self.page_size_param = Some(param.into());
        self.ideal_page_size = Some(size);
        self
    }

    /// Whether a field with the given name is read from pages
    pub fn reads(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

// ============================================================================
// Next Page
// ============================================================================

/// Where the next page is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    /// New URL replacing the current one
    pub url: Option<Url>,
    /// Query parameters to add or replace
    pub params: StringMap,
    /// Number the next page will have
    pub page_number: u32,
}

impl NextPage {
    /// Continue with a single parameter
    pub fn with_param(key: impl Into<String>, value: impl Into<String>, page_number: u32) -> Self {
        let mut params = StringMap::new();
        params.insert(key.into(), value.into());
        Self {
            url: None,
            params,
            page_number,
        }
    }

    /// Continue with a new URL
    pub fn with_url(url: Url, page_number: u32) -> Self {
        Self {
            url: Some(url),
            params: StringMap::new(),
            page_number,
        }
    }

    /// The request for the next page, derived from the current one
    ///
    /// A new URL drops the current parameters; cookies and headers carry over.
    pub fn request(&self, current: &Request) -> Request {
        let mut next = current.clone();
        if let Some(url) = &self.url {
            next.url = url.clone();
            next.params.clear();
        }
        next.params
            .extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        next
    }
}

// ============================================================================
// State
// ============================================================================

/// Phase of the paginator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginatorPhase {
    /// No page fetched yet
    #[default]
    Init,
    /// A next page was found
    HasNext,
    /// A page is being fetched and processed
    Fetching,
    /// No more pages will be fetched
    Stopped,
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Token of the current page
    pub current_page: Option<String>,
    /// Number of the current page
    pub current_page_number: u32,
    /// Token of the next page
    pub next_page: Option<String>,
    /// Number of the next page
    pub next_page_number: Option<u32>,
    /// Records per page requested
    pub ideal_page_size: Option<u32>,
    /// Pages visited so far
    pub follow_count: u32,
    /// Maximum pages, 0 for no limit
    pub follow_count_limit: u32,
    /// Every value read from the last page
    pub fields: StringMap,
    /// Records extracted so far
    pub total_fetched: u64,
}

impl PaginationState {
    /// Whether the follow-count limit has been reached
    pub fn limit_reached(&self) -> bool {
        self.follow_count_limit > 0 && self.follow_count >= self.follow_count_limit
    }
}

// ============================================================================
// Stop Handle
// ============================================================================

/// Shared flag stopping pagination at the next page boundary
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request pagination to stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Context
// ============================================================================

/// Snapshot of the pagination state exposed to callers
#[derive(Debug, Clone)]
pub struct PaginationContext {
    pub(super) state: PaginationState,
    pub(super) phase: PaginatorPhase,
    pub(super) stop: StopHandle,
}

impl PaginationContext {
    pub fn current_page(&self) -> Option<&str> {
        self.state.current_page.as_deref()
    }

    pub fn current_page_number(&self) -> u32 {
        self.state.current_page_number
    }

    pub fn next_page(&self) -> Option<&str> {
        self.state.next_page.as_deref()
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.state.next_page_number
    }

    /// Number of pages visited
    pub fn page_count(&self) -> u32 {
        self.state.follow_count
    }

    pub fn follow_count_limit(&self) -> u32 {
        self.state.follow_count_limit
    }

    pub fn ideal_page_size(&self) -> Option<u32> {
        self.state.ideal_page_size
    }

    /// Value read from the last page
    pub fn field(&self, name: &str) -> Option<&str> {
        self.state.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &StringMap {
        &self.state.fields
    }

    pub fn phase(&self) -> PaginatorPhase {
        self.phase
    }

    /// Whether another page will be fetched
    pub fn has_more_pages(&self) -> bool {
        self.phase == PaginatorPhase::HasNext && !self.stop.is_stopped()
    }

    /// Stop before the next page is fetched
    pub fn stop_pagination(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Called before each next page is fetched
///
/// May edit the request or stop pagination through the context.
pub trait NextPageHandler: Send + Sync {
    fn prepare(&self, context: &PaginationContext, request: &mut Request);
}

impl<F> NextPageHandler for F
where
    F: Fn(&PaginationContext, &mut Request) + Send + Sync,
{
    fn prepare(&self, context: &PaginationContext, request: &mut Request) {
        self(context, request);
    }
}

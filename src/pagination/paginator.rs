//! Pagination state machine
//!
//! `Init -> Fetching -> (HasNext -> Fetching)* -> Stopped`. Pages are
//! processed one at a time; the next page is computed from the values read
//! from the page just processed.

use super::types::{
    NextPage, PaginationContext, PaginationState, PaginatorPhase, PaginatorSettings, StopHandle,
    CURRENT_PAGE, CURRENT_PAGE_NUMBER, NEXT_PAGE, NEXT_PAGE_NUMBER,
};
use crate::fetch::Request;
use crate::types::StringMap;
use tracing::debug;
use url::Url;

/// Drives pagination across the pages of one parse
#[derive(Debug, Clone)]
pub struct Paginator {
    settings: PaginatorSettings,
    state: PaginationState,
    phase: PaginatorPhase,
    stop: StopHandle,
    /// Number assigned to the page fetched next
    pending_number: Option<u32>,
}

impl Paginator {
    pub fn new(settings: PaginatorSettings) -> Self {
        Self::with_stop_handle(settings, StopHandle::new())
    }

    /// Create a paginator sharing an existing stop flag
    pub fn with_stop_handle(settings: PaginatorSettings, stop: StopHandle) -> Self {
        let state = PaginationState {
            follow_count_limit: settings.follow_count,
            ideal_page_size: settings.ideal_page_size,
            ..Default::default()
        };
        let pending_number = settings.page_param.as_ref().map(|_| settings.start_page);
        Self {
            settings,
            state,
            phase: PaginatorPhase::Init,
            stop,
            pending_number,
        }
    }

    pub fn settings(&self) -> &PaginatorSettings {
        &self.settings
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn phase(&self) -> PaginatorPhase {
        self.phase
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The first request, with page and page size parameters when configured
    pub fn first_request(&self, base: Request) -> Request {
        let mut request = base;
        if let Some(param) = &self.settings.page_param {
            request
                .params
                .insert(param.clone(), self.settings.start_page.to_string());
        }
        self.with_page_size(request)
    }

    fn with_page_size(&self, mut request: Request) -> Request {
        if let (Some(param), Some(size)) =
            (&self.settings.page_size_param, self.settings.ideal_page_size)
        {
            request.params.insert(param.clone(), size.to_string());
        }
        request
    }

    /// The request for a computed next page
    pub fn next_request(&self, next: &NextPage, current: &Request) -> Request {
        self.with_page_size(next.request(current))
    }

    /// Enter `Fetching` for a new page
    pub fn begin_page(&mut self) {
        self.phase = PaginatorPhase::Fetching;
        self.state.follow_count += 1;
        self.state.current_page_number = self
            .pending_number
            .take()
            .unwrap_or(self.state.current_page_number + 1);
        debug!(
            page = self.state.current_page_number,
            visited = self.state.follow_count,
            "Fetching page"
        );
    }

    /// Compute the next page from the values read from the current page
    ///
    /// Returns `None` and enters `Stopped` when pagination is over.
    pub fn compute_next(
        &mut self,
        fields: &StringMap,
        current_url: &Url,
        record_count: usize,
    ) -> Option<NextPage> {
        self.state.total_fetched += record_count as u64;
        self.state.fields = fields.clone();
        self.state.current_page = non_blank(fields.get(CURRENT_PAGE));
        if let Some(number) =
            non_blank(fields.get(CURRENT_PAGE_NUMBER)).and_then(|n| n.parse::<u32>().ok())
        {
            self.state.current_page_number = number;
        }
        self.state.next_page = non_blank(fields.get(NEXT_PAGE));
        self.state.next_page_number = non_blank(fields.get(NEXT_PAGE_NUMBER))
            .and_then(|n| n.trim().parse::<u32>().ok());

        let next = self.next_page(current_url, record_count);
        match &next {
            Some(next) => {
                self.phase = PaginatorPhase::HasNext;
                self.pending_number = Some(next.page_number);
                self.state.next_page_number = Some(next.page_number);
            }
            None => self.phase = PaginatorPhase::Stopped,
        }
        next
    }

    fn next_page(&self, current_url: &Url, record_count: usize) -> Option<NextPage> {
        if self.stop.is_stopped() {
            debug!("Pagination stopped by request");
            return None;
        }
        if self.state.limit_reached() {
            debug!(
                limit = self.state.follow_count_limit,
                "Follow count limit reached"
            );
            return None;
        }

        let number = self.state.current_page_number + 1;

        if let Some(token) = &self.state.next_page {
            if self.state.current_page.as_deref() == Some(token.as_str()) {
                debug!(token = %token, "Next page equals current page");
                return None;
            }
            return match &self.settings.page_param {
                Some(param) => {
                    let current_value = current_url
                        .query_pairs()
                        .find(|(k, _)| k == param.as_str())
                        .map(|(_, v)| v.into_owned());
                    if current_value.as_deref() == Some(token.as_str()) {
                        debug!(token = %token, "Next page equals current page");
                        return None;
                    }
                    Some(NextPage::with_param(param.clone(), token.clone(), number))
                }
                None => {
                    let url = current_url.join(token).ok()?;
                    if url == *current_url {
                        debug!(url = %url, "Next page equals current page");
                        return None;
                    }
                    Some(NextPage::with_url(url, number))
                }
            };
        }

        if let Some(next_number) = self.state.next_page_number {
            if next_number == self.state.current_page_number {
                debug!(page = next_number, "Next page number equals current page");
                return None;
            }
            let param = self.settings.page_param.as_ref()?;
            return Some(NextPage::with_param(
                param.clone(),
                next_number.to_string(),
                next_number,
            ));
        }

        // paging by parameter alone: continue while pages are full
        let param = self.settings.page_param.as_ref()?;
        if self.settings.reads(NEXT_PAGE) || self.settings.reads(NEXT_PAGE_NUMBER) {
            return None;
        }
        if record_count == 0 {
            return None;
        }
        if let Some(size) = self.settings.ideal_page_size {
            if record_count < size as usize {
                return None;
            }
        }
        Some(NextPage::with_param(param.clone(), number.to_string(), number))
    }

    /// Whether another page will be fetched
    pub fn has_more_pages(&self) -> bool {
        self.phase == PaginatorPhase::HasNext && !self.stop.is_stopped()
    }

    /// Stop before the next page is fetched
    pub fn stop_pagination(&self) {
        self.stop.stop();
    }

    /// Mark pagination as over
    pub fn finish(&mut self) {
        self.phase = PaginatorPhase::Stopped;
    }

    /// Snapshot for callers and hooks
    pub fn context(&self) -> PaginationContext {
        PaginationContext {
            state: self.state.clone(),
            phase: self.phase,
            stop: self.stop.clone(),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
